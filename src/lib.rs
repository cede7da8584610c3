//! srtlate - Streaming SRT Subtitle Translation
//!
//! Translates SubRip subtitles through an LLM completion endpoint while
//! keeping every cue's original timing. Cues are packed into token-bounded
//! groups, each group is sent as one streaming request, and translated cues
//! are written out as soon as their delimiter arrives.

pub mod cli;
pub mod config;
pub mod error;
pub mod grouping;
pub mod job;
pub mod pipeline;
pub mod subtitle;
pub mod tokenizer;
pub mod translate;
pub mod workflow;
