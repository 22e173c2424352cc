//! Print the physical layout of a data block definition file.
//!
//! Usage:
//!   db_layout FILE.db [--defaults]
//!
//! One row per placed field: BYTE[.BIT], type, flattened name. With
//! --defaults, the BEGIN section is applied to a zeroed buffer and the
//! resulting values are printed as well.

use s7db::{flatten, generate, parse, DataBlock, PhysicalField};

fn main() -> anyhow::Result<()> {
    let mut file = None;
    let mut show_defaults = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--defaults" | "-d" => show_defaults = true,
            "--help" | "-h" => {
                println!("usage: db_layout FILE.db [--defaults]");
                return Ok(());
            }
            other => file = Some(other.to_string()),
        }
    }
    let path = file.ok_or_else(|| anyhow::anyhow!("usage: db_layout FILE.db [--defaults]"))?;
    let source = std::fs::read_to_string(&path)?;

    let program = parse(&source)?;
    let fields = flatten(&program)?;
    let layout = generate(&fields);

    println!(
        "DATA_BLOCK \"{}\"  version {}  {} bytes",
        program.block.name, program.block.version, layout.total_size
    );
    for field in &layout.fields {
        match field {
            PhysicalField::Scalar { name, ty, offset } => {
                println!("{:>5}     {:<12} {}", offset, ty.to_string(), name);
            }
            PhysicalField::BoolGroup { names, offset } => {
                for (bit, name) in names.iter().enumerate() {
                    println!(
                        "{:>5}.{:<3} {:<12} {}",
                        offset + bit / 8,
                        bit % 8,
                        "Bool",
                        name
                    );
                }
            }
        }
    }

    if show_defaults {
        let mut db = DataBlock::new(layout)?;
        for reason in db.apply_defaults(&program.defaults) {
            eprintln!("skipped default: {}", reason);
        }
        println!();
        let names: Vec<String> = db.field_names().map(str::to_string).collect();
        for name in names {
            let value = db.get(&name)?;
            println!("{:<40} {}", name, value);
        }
    }
    Ok(())
}
