#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pgtunnel_wire::{WireReader, WireWriter};

#[derive(Arbitrary, Debug)]
struct Cells {
    cells: Vec<Option<Vec<u8>>>,
    trailing: Vec<u8>,
}

fuzz_target!(|input: Cells| {
    let mut out = WireWriter::new();
    for cell in &input.cells {
        match cell {
            Some(bytes) => out.block(bytes),
            None => out.null(),
        };
    }
    let encoded = out.finish();

    let mut reader = WireReader::new(&encoded);
    for cell in &input.cells {
        assert_eq!(reader.cell().expect("well-formed"), cell.as_deref());
    }
    assert!(reader.is_empty());

    // Arbitrary input must fail cleanly, never panic.
    let mut reader = WireReader::new(&input.trailing);
    while !reader.is_empty() {
        if reader.cell().is_err() {
            break;
        }
    }
});
