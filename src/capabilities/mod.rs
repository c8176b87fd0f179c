mod storage;

pub use self::storage::{
    Storage, StorageError, StorageKey, StorageOperation, StorageOutput, StorageResult,
    MAX_KEY_LENGTH, MAX_VALUE_SIZE,
};

// Crux's built-in Render capability provides everything needed for
// triggering view updates.
pub use crux_core::render::Render;

use crux_core::bridge::ResolveSerialized;
use crux_core::capability::ProtoContext;
use crux_core::render::RenderOperation;
use crux_core::{Request, WithContext};
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::event::Event;

pub type AppRender = Render<Event>;
pub type AppStorage = Storage<Event>;

pub struct Capabilities {
    pub render: AppRender,
    pub storage: AppStorage,
}

pub enum Effect {
    Render(Request<RenderOperation>),
    Storage(Request<StorageOperation>),
}

/// Serializable counterpart of [`Effect`] for the FFI boundary.
#[derive(Serialize, Deserialize)]
pub enum EffectFfi {
    Render(RenderOperation),
    Storage(StorageOperation),
}

impl crux_core::Effect for Effect {
    type Ffi = EffectFfi;

    fn serialize(self) -> (Self::Ffi, ResolveSerialized) {
        match self {
            Effect::Render(request) => request.serialize(EffectFfi::Render),
            Effect::Storage(request) => request.serialize(EffectFfi::Storage),
        }
    }
}

impl WithContext<App, Effect> for Capabilities {
    fn new_with_context(context: ProtoContext<Effect, Event>) -> Capabilities {
        Capabilities {
            render: Render::new(context.specialize(Effect::Render)),
            storage: Storage::new(context.specialize(Effect::Storage)),
        }
    }
}
