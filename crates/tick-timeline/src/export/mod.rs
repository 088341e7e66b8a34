pub mod jsonl;

pub use jsonl::{
    export_stats, serialize_lines, session_lines, write_lines, JsonlLine, EXPORT_VERSION,
};
