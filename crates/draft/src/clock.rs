// Archivo: clock.rs
// Propósito: colaboradores de identidad y tiempo. El almacén pide ids y
// timestamps a través de estos traits para que las pruebas puedan fijarlos.
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Mutex;
use uuid::Uuid;

/// Fuente de tiempo para `published_at`, `created_at` y `updated_at`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Generador de ids para `SnapshotRecord` cuando el caller no aporta uno.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// Reloj del sistema, truncado a microsegundos: es la precisión con la que
/// los almacenes Diesel guardan los `*_ts`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// Reloj manual para pruebas: devuelve siempre el instante fijado.
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { instant: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.instant.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    /// Avanza el reloj `by` y devuelve el nuevo instante.
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let mut guard = self.instant.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
        *guard
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}
