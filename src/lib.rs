//! Kiosk Voice: voice ordering session engine for café self-service kiosks.
//!
//! Turns a stream of speech events into cart mutations and a submitted
//! order:
//! Speech capture → intent classification → session dispatch → cart / order backend
//!
//! # Architecture
//!
//! The engine is a single-consumer event loop around one mutable [`session::Session`]:
//! - **Speech I/O**: capture and synthesis live behind the [`speech`] traits
//! - **NLU gateway**: prompts a remote classifier and normalizes its JSON;
//!   failures degrade to a keyword fallback, never past the gateway
//! - **Dispatch**: a pure action table mapping classified results to effects
//! - **Collaborators**: cart, navigation and order submission are trait seams
//!   driven only by dispatched effects
//!
//! Timers (inactivity, silence, listening ceiling) and late classifier
//! results are invalidated by generation and epoch counters rather than by
//! cancelling tasks.

pub mod cart;
pub mod config;
pub mod error;
pub mod intent;
pub mod menu;
pub mod nlu;
pub mod recommend;
pub mod session;
pub mod speech;
pub mod submit;

pub use cart::{Cart, CartLine, MemoryCart};
pub use config::KioskConfig;
pub use error::{KioskError, Result};
pub use menu::Menu;
pub use nlu::NluResult;
pub use nlu::gateway::{HttpClassifier, NluGateway, RemoteClassifier};
pub use session::engine::{EngineDeps, EngineHandle, RuntimeEvent, SessionEngine};
pub use session::{Session, SessionState};
pub use speech::{Navigator, SpeechEvent, SpeechInput, SpeechOutput};
pub use submit::{HttpOrderSubmitter, OrderSubmitter};
