//! Core of a language-learning reader: subtitle timelines, vocabulary
//! annotation, sentence segmentation and bookmarks, and the playback
//! progress controller.
//!
//! The crate has no UI. Hosts feed it text, subtitle files and media
//! events, and render the view models and effects it returns.

pub mod annotator;
pub mod bindings;
pub mod bookmarks;
pub mod boundary;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod playback;
pub mod preferences;
pub mod reader;
pub mod segmenter;
pub mod subtitle;
pub mod vocabulary;
