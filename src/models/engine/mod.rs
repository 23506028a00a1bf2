pub mod hit_window;
pub mod measure;
pub mod note;
pub mod pool;
pub mod timing;

pub use hit_window::HitWindow;
pub use measure::StopAccumulator;
pub use note::{Note, NoteContext, NoteDesc, NoteEvent, NoteState};
pub use pool::{Pool, Poolable};
pub use timing::{ScrollMode, TimingConverter};
