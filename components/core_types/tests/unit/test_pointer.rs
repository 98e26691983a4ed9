//! Unit tests for segmented pointers

use core_types::{ErrorKind, Segment, UcPointer};

#[test]
fn test_stack_pointer_layout() {
    let raw = UcPointer::stack(0x0012, 0x0ffa);
    assert_eq!(raw >> 16, 0x0012);
    assert_eq!(raw & 0xffff, 0x0ffa);
}

#[test]
fn test_heap_and_global_segments() {
    assert_eq!(UcPointer::string(5) >> 16, u32::from(Segment::STRING));
    assert_eq!(UcPointer::list(5) >> 16, u32::from(Segment::LIST));
    assert_eq!(UcPointer::object(5) >> 16, u32::from(Segment::OBJECT));
    assert_eq!(UcPointer::global(5) >> 16, u32::from(Segment::GLOBAL));
}

#[test]
fn test_null_pointer_is_not_a_stack_pointer() {
    let err = UcPointer::from_raw(0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidSegment);
}

#[test]
fn test_decode_matches_constructor() {
    assert_eq!(
        UcPointer::from_raw(UcPointer::object(0x0321)).unwrap(),
        UcPointer::Object(0x0321)
    );
    assert_eq!(
        UcPointer::from_raw(UcPointer::stack(7, 0x20)).unwrap(),
        UcPointer::Stack { pid: 7, offset: 0x20 }
    );
}
