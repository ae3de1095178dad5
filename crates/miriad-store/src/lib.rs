pub mod database;
pub mod error;
pub mod ltm;
pub mod present;
pub mod schema;
pub mod session;
pub mod temporal;
pub mod workers;

pub use database::Database;
pub use error::StoreError;

use ltm::LtmRepo;
use present::PresentRepo;
use session::SessionConfigRepo;
use temporal::TemporalRepo;
use workers::WorkerRepo;

/// Bundle of all repositories over one database. Cheap to clone.
#[derive(Clone)]
pub struct Stores {
    pub temporal: TemporalRepo,
    pub present: PresentRepo,
    pub ltm: LtmRepo,
    pub workers: WorkerRepo,
    pub session: SessionConfigRepo,
}

impl Stores {
    pub fn new(db: Database) -> Self {
        Self {
            temporal: TemporalRepo::new(db.clone()),
            present: PresentRepo::new(db.clone()),
            ltm: LtmRepo::new(db.clone()),
            workers: WorkerRepo::new(db.clone()),
            session: SessionConfigRepo::new(db),
        }
    }
}
