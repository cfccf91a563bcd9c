pub mod derive;
pub mod domain;
pub mod draft;
pub mod error;
pub mod filter;
pub mod format;
pub mod guard;
pub mod ports;
pub mod record;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use domain::{
    AccountUser, AttendanceRecord, BmiRecord, Course, CredentialUpdate, Credentials, Employee,
    Entity, EntitySpec, Equipment, LeaveRequest, LeaveStatus, MedicalRecord, PersistedSession,
    Reference, Role, Session, SessionStatus, User,
};
pub use draft::{DraftMode, FormDraft};
pub use error::ViewError;
pub use filter::{Criterion, FilterCriteria, FilterState, QueryParams, RefetchDecision};
pub use guard::{can, session_can, Access, Capability, GuardState, Navigation, RouteGuard, RouteMatch};
pub use ports::{
    ApiGateway, ApiRequest, MemoryTokenStore, Method, PortError, PortResult, TokenStore,
};
pub use record::{RecordController, RefetchTrigger, ViewState};
pub use session::{landing_route, SessionStore};
