pub mod file;
pub mod memory;
pub mod supabase;
pub mod traits;

// Re-export
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use supabase::{AuthSession, SupabaseBackend};
pub use traits::{Backend, ProfileRepository, SessionProvider, TaskOrder, TaskRepository};
