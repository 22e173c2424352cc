//! # s7db — data block layout compiler and buffer codec
//!
//! Compiles textual data block definitions (as exported by TIA Portal for
//! non-optimized blocks) into a precise binary layout, then gives named,
//! typed read/write access to a raw byte buffer mirroring the
//! controller's memory.
//!
//! ## Definition language
//!
//! - **TYPE**: named reusable struct (`TYPE "Sensor" VERSION : 0.1 STRUCT
//!   ... END_STRUCT; END_TYPE`)
//! - **DATA_BLOCK**: the block itself, with a `VAR`/`STRUCT` body or a
//!   quoted type reference, plus an ignorable `BEGIN` defaults section
//! - Arrays (`Array[1..3] of "Sensor"`), nested structs, the `DTL`
//!   date-time composite, `String[n]`, `//` comments, attribute blocks
//!
//! ## Layout rules
//!
//! Consecutively declared booleans within the same enclosing structure
//! pack into shared 16-bit words (16 per word at most); other types sit at
//! their natural width, big-endian. Field order is declaration order.
//!
//! ## Example
//!
//! ```text
//! DATA_BLOCK "DB_IO"
//! VERSION : 0.1
//!     STRUCT
//!         Run : Bool;
//!         Stop : Bool;
//!         Speed : Int;
//!     END_STRUCT;
//! BEGIN
//! END_DATA_BLOCK
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use s7db::{load, DataBlock, Value};
//!
//! let layout = load(std::fs::read_to_string("DB_IO.db")?.as_str())?;
//! let mut db = DataBlock::new(layout)?;
//! db.set("Run", Value::Bool(true))?;
//! let speed = db.get("Speed")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Transferring the raw bytes to a physical controller (IP/rack/slot,
//! block numbers) is the job of a separate device client working on
//! [`DataBlock::as_bytes`]/[`DataBlock::bytes_mut`].

pub mod ast;
pub mod codec;
pub mod layout;
pub mod parser;
pub mod resolve;
pub mod value;

pub use ast::{DataBlockDecl, DefaultAssignment, Literal, Program, S7Type, TypeNode};
pub use codec::{Address, AddressIndex, CodecError, DataBlock};
pub use layout::{generate, generate_skipping, Layout, PhysicalField};
pub use parser::{parse, ParseError};
pub use resolve::{flatten, path_name, PathSeg, QualifiedField, ResolveError};
pub use value::Value;

/// Any failure while compiling a definition into a layout. No partial
/// layout is ever produced.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Compile definition text into a [`Layout`]: parse, resolve, generate.
pub fn load(source: &str) -> Result<Layout, LoadError> {
    let program = parser::parse(source)?;
    let fields = resolve::flatten(&program)?;
    let layout = layout::generate(&fields);
    log::debug!(
        "compiled data block '{}': {} fields, {} bytes",
        program.block.name,
        fields.len(),
        layout.total_size
    );
    Ok(layout)
}

/// Read a definition file and compile it.
pub fn load_file(path: impl AsRef<std::path::Path>) -> Result<Layout, LoadError> {
    let source = std::fs::read_to_string(path)?;
    load(&source)
}
