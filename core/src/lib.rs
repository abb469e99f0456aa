pub mod config;
pub mod error;
pub mod input;
pub mod model;
pub mod repository;
pub mod service;
pub mod validation;

pub use config::{BackendConfig, Config};
pub use error::{AuthError, Error, ErrorKind, FieldError, Result};
pub use input::{expand_key, parse_args, ParsedInput, TASK_KEYS};
pub use model::profile::{Profile, ProfilePatch};
pub use model::task::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
pub use model::user::{Credentials, SignUp, User};
pub use repository::{
    Backend, FileBackend, MemoryBackend, ProfileRepository, SessionProvider, SupabaseBackend,
    TaskOrder, TaskRepository,
};
pub use service::dto::{Notice, NoticeLevel, Operation, TaskFilter, TaskGroups, TaskStats};
pub use service::profile_store::ProfileStore;
pub use service::session::{AuthService, Session};
pub use service::task_store::TaskStore;
