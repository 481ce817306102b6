// Esquema Diesel compartido por SQLite y Postgres.
// Tablas: draftables, articles
// Los timestamps se guardan como microsegundos desde epoch (UTC).
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    draftables (id) {
        id -> Text,
        seq -> BigInt,
        entity_type -> Text,
        entity_id -> Nullable<Text>,
        payload -> Text,
        published_at_ts -> Nullable<BigInt>,
        owner_type -> Nullable<Text>,
        owner_id -> Nullable<Text>,
        metadata -> Text,
        created_at_ts -> BigInt,
        updated_at_ts -> BigInt,
    }
}
diesel::table! {
    articles (id) {
        id -> Text,
        title -> Text,
        body -> Text,
        created_at_ts -> BigInt,
    }
}
allow_tables_to_appear_in_same_query!(draftables, articles);
