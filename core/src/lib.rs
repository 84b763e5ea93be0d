//! prosefix core
//!
//! Data model shared by the correction engine and its front ends: text
//! ranges, the named prompt set and the settings store.

pub mod config;
pub mod prompts;
pub mod range;

pub use config::{
    resolve_env_var, ApiSettings, ChatSettings, ConfigFormat, ConfigManager, EnvOverrides, Settings,
    WidgetPosition,
};
pub use prompts::{default_prompts, NamePromptPair, PromptError, PromptManager, PromptPatch};
pub use range::{byte_range, char_len, char_to_byte, slice_chars, TextRange};
