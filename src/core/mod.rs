//! 核心编排层：错误与恢复、图修复状态机、回合控制

pub mod coordinator;
pub mod error;
pub mod recovery;
pub mod state;
pub mod turn;

pub use coordinator::{DiagramCoordinator, DEFAULT_MAX_CORRECTIONS};
pub use error::{DuetError, RecoveryAction};
pub use recovery::RecoveryEngine;
pub use state::{DiagramEvent, DiagramOutcome, DiagramState, FailureResolution, PersonaThread};
pub use turn::{new_generation_id, PersonaReply, TurnController, TurnReport};
