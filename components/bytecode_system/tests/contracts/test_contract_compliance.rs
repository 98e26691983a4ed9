//! Contract compliance tests: byte values the interpreter relies on

use bytecode_system::{CodeReader, Opcode, UsecodeClass, UsecodeImage, UsecodeSource};
use core_types::ErrorKind;

/// Every defined opcode byte decodes and re-encodes to the same byte
#[test]
fn test_contract_opcode_bytes() {
    let mut defined = 0;
    for byte in 0u8..=0xFF {
        // enough zero operand bytes for the longest fixed encoding
        let mut code = vec![byte];
        code.extend_from_slice(&[0; 12]);
        if byte == 0x0D {
            // empty string literal: len 0 then terminator
            code.truncate(4);
        }
        let mut reader = CodeReader::new(&code, 0);
        match Opcode::decode(&mut reader) {
            Ok(op) => {
                defined += 1;
                assert_eq!(op.byte(), byte);
                assert_eq!(usize::from(reader.position()), op.encoded_len());
            }
            Err(err) => assert_eq!(err.kind, ErrorKind::InvalidOpcode, "byte {byte:02X}"),
        }
    }
    assert_eq!(defined, 105);
}

/// Images expose class code and events through UsecodeSource
#[test]
fn test_contract_usecode_source() {
    let mut class = UsecodeClass::new();
    class.emit(Opcode::Ret);
    class.set_event(0x20, 0);
    let mut image = UsecodeImage::new();
    image.insert(7, class);
    let source: &dyn UsecodeSource = &image;
    assert_eq!(source.class_code(7), Some(&[0x50u8][..]));
    assert_eq!(source.class_event(7, 0x20), Some(0));
    assert!(source.class_code(8).is_none());
}
