pub mod engine;
pub mod input;
pub mod states;

pub use engine::{BookingFlow, FlowTransitionError};
pub use states::{
    BookingSession, BookingStage, FlowAction, FlowContext, FlowEvent, Prompt, TransitionOutcome,
};
