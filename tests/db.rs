//! Definition-language unit tests: syntax (parse success/failure) and
//! semantics (type substitution, arrays, DTL, cycles).

use s7db::ast::{Literal, TypeNode};
use s7db::{flatten, parse, ParseError, ResolveError, S7Type};

// ==================== Syntax: valid programs ====================

#[test]
fn parse_minimal_struct_block() {
    let src = r#"
DATA_BLOCK "DB_IO"
VERSION : 0.1
    STRUCT
        Run : Bool;
        Speed : Int;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    assert_eq!(p.block.name, "DB_IO");
    assert!(p.types.is_empty());
    let fields = flatten(&p).expect("flatten");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name(), "Run");
    assert_eq!(fields[1].name(), "Speed");
}

#[test]
fn parse_var_body() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
VAR
    a : Bool;
    b : Word;
END_VAR
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[1].ty, S7Type::Word);
}

#[test]
fn parse_body_as_type_reference() {
    let src = r#"
TYPE "Motor"
VERSION : 0.1
    STRUCT
        Run : Bool;
        Rpm : Int;
    END_STRUCT;
END_TYPE

DATA_BLOCK "DB_Motor"
VERSION : 0.1
    "Motor"
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    assert!(matches!(p.block.body, TypeNode::TypeRef(ref n) if n == "Motor"));
    let fields = flatten(&p).expect("flatten");
    assert_eq!(fields[0].name(), "Run");
    assert_eq!(fields[1].name(), "Rpm");
}

#[test]
fn parse_all_primitive_types() {
    let src = r#"
DATA_BLOCK "AllTypes"
VERSION : 0.1
    STRUCT
        a : Bool;
        b : Byte;
        c : Char;
        d : Int;
        e : Word;
        f : S5Time;
        g : Date;
        h : DInt;
        i : DWord;
        j : UDInt;
        k : Time;
        l : Time_of_Day;
        m : Real;
        n : DReal;
        o : String[8];
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    assert_eq!(fields.len(), 15);
    assert_eq!(fields[13].ty, S7Type::DReal);
    assert_eq!(fields[14].ty, S7Type::S7String(8));
}

#[test]
fn parse_with_comments_and_attributes() {
    let src = r#"
DATA_BLOCK "X" { S7_Optimized_Access := 'FALSE' }
VERSION : 0.1
    STRUCT
        Run { ExternalAccessible := 'True'; ExternalVisible := 'True' } : Bool;   // drive enable
        Speed : Int := 20;    // default rpm
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name(), "Run");
    // inline default is kept on the AST
    if let TypeNode::Struct(members) = &p.block.body {
        assert_eq!(members[1].default, Some(Literal::Int(20)));
    } else {
        panic!("expected struct body");
    }
}

#[test]
fn parse_quoted_identifiers_strip_quotes() {
    let src = r#"
DATA_BLOCK "My DB.Main"
VERSION : 0.1
    STRUCT
        "Field With Space" : Bool;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    assert_eq!(p.block.name, "My DB.Main");
    let fields = flatten(&p).expect("flatten");
    assert_eq!(fields[0].name(), "Field With Space");
}

#[test]
fn parse_keywords_case_insensitive() {
    let src = r#"
data_block "x"
version : 0.1
non_retain
    struct
        a : bool;
    end_struct;
begin
end_data_block
"#;
    let p = parse(src).expect("parse");
    assert!(p.block.non_retain);
    assert_eq!(flatten(&p).expect("flatten").len(), 1);
}

#[test]
fn parse_bom_prefixed_source() {
    let src = "\u{feff}DATA_BLOCK \"X\"\nVERSION : 0.1\nVAR\n a : Bool;\nEND_VAR\nBEGIN\nEND_DATA_BLOCK\n";
    let p = parse(src).expect("parse");
    assert_eq!(p.block.name, "X");
}

#[test]
fn parse_nested_struct() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        Motor : STRUCT
            Run : Bool;
            Rpm : Int;
        END_STRUCT;
        Spare : Byte;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    let names: Vec<String> = fields.iter().map(|f| f.name()).collect();
    assert_eq!(names, ["Motor.Run", "Motor.Rpm", "Spare"]);
}

#[test]
fn parse_begin_section_assignments() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        Motor : STRUCT
            Run : Bool;
        END_STRUCT;
        Speed : Int;
        Ratio : Real;
        Mask : Word;
        Delay : Time;
    END_STRUCT;
BEGIN
    Motor.Run := TRUE;
    Speed := 42;
    Ratio := 2.5;
    Mask := 16#FF;
    Delay := T#5s;
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    assert_eq!(p.defaults.len(), 5);
    assert_eq!(p.defaults[0].path, "Motor.Run");
    assert_eq!(p.defaults[0].value, Literal::Bool(true));
    assert_eq!(p.defaults[1].value, Literal::Int(42));
    assert_eq!(p.defaults[2].value, Literal::Real(2.5));
    assert_eq!(p.defaults[3].value, Literal::Hex(0xFF));
    assert_eq!(p.defaults[4].value, Literal::Duration("T#5s".to_string()));
}

#[test]
fn parse_string_without_length_defaults_to_254() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        Name : String;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    assert_eq!(fields[0].ty, S7Type::S7String(254));
}

#[test]
fn parse_array_quoted_numeric_bound() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        Flags : Array[1.."4"] of Bool;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    assert_eq!(fields.len(), 4);
    assert_eq!(fields[3].name(), "Flags[4]");
}

#[test]
fn parse_two_type_declarations() {
    let src = r#"
TYPE "A"
VERSION : 0.1
    STRUCT
        x : Bool;
    END_STRUCT;
END_TYPE

TYPE "B"
VERSION : 0.1
    STRUCT
        y : Int;
    END_STRUCT;
END_TYPE

DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : "A";
        b : "B";
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    assert_eq!(p.types.len(), 2);
    let fields = flatten(&p).expect("flatten");
    let names: Vec<String> = fields.iter().map(|f| f.name()).collect();
    assert_eq!(names, ["a.x", "b.y"]);
}

// ==================== Syntax: invalid / parse errors ====================

#[test]
fn parse_missing_end_struct_fails() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : Bool;
BEGIN
END_DATA_BLOCK
"#;
    let e = parse(src).expect_err("missing END_STRUCT");
    assert!(matches!(e, ParseError::MalformedDefinition { .. }), "{:?}", e);
}

#[test]
fn parse_missing_end_data_block_fails() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : Bool;
    END_STRUCT;
BEGIN
"#;
    assert!(parse(src).is_err());
}

#[test]
fn parse_missing_end_type_fails() {
    let src = r#"
TYPE "A"
VERSION : 0.1
    STRUCT
        x : Bool;
    END_STRUCT;

DATA_BLOCK "X"
VERSION : 0.1
    "A"
BEGIN
END_DATA_BLOCK
"#;
    assert!(parse(src).is_err());
}

#[test]
fn parse_unknown_bare_type_is_unsupported() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : Quaternion;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let e = parse(src).expect_err("unknown type keyword");
    match e {
        ParseError::UnsupportedType { keyword, line } => {
            assert_eq!(keyword, "Quaternion");
            assert_eq!(line, 5);
        }
        other => panic!("expected UnsupportedType, got {:?}", other),
    }
}

#[test]
fn parse_unterminated_array_bounds_fails() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : Array[1.. of Bool;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    assert!(parse(src).is_err());
}

#[test]
fn parse_symbolic_array_bound_fails() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : Array[1.."MAX_ITEMS"] of Bool;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let e = parse(src).expect_err("symbolic bound");
    assert!(matches!(e, ParseError::MalformedDefinition { .. }), "{:?}", e);
}

#[test]
fn parse_empty_struct_fails() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    assert!(parse(src).is_err());
}

#[test]
fn parse_element_without_semicolon_fails() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : Bool
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    assert!(parse(src).is_err());
}

#[test]
fn parse_string_length_over_254_fails() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        s : String[300];
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    assert!(parse(src).is_err());
}

// ==================== Semantics: resolution ====================

#[test]
fn resolve_array_of_type_expands_in_order() {
    let src = r#"
TYPE "Sensor"
VERSION : 0.1
    STRUCT
        A : Bool;
        B : Int;
    END_STRUCT;
END_TYPE

DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        Sensor : Array[1..3] of "Sensor";
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    let names: Vec<String> = fields.iter().map(|f| f.name()).collect();
    assert_eq!(
        names,
        [
            "Sensor[1].A",
            "Sensor[1].B",
            "Sensor[2].A",
            "Sensor[2].B",
            "Sensor[3].A",
            "Sensor[3].B",
        ]
    );
}

#[test]
fn resolve_array_of_inline_struct() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        Axis : Array[0..1] of STRUCT
            Pos : Real;
            Homed : Bool;
        END_STRUCT;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    let names: Vec<String> = fields.iter().map(|f| f.name()).collect();
    assert_eq!(names, ["Axis[0].Pos", "Axis[0].Homed", "Axis[1].Pos", "Axis[1].Homed"]);
}

#[test]
fn resolve_dtl_expands_to_eight_fields() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        Stamp : DTL;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    let names: Vec<String> = fields.iter().map(|f| f.name()).collect();
    assert_eq!(
        names,
        [
            "Stamp.YEAR",
            "Stamp.MONTH",
            "Stamp.DAY",
            "Stamp.WEEKDAY",
            "Stamp.HOUR",
            "Stamp.MINUTE",
            "Stamp.SECOND",
            "Stamp.NANOSECOND",
        ]
    );
    assert_eq!(fields[0].ty, S7Type::Word);
    assert_eq!(fields[7].ty, S7Type::DWord);
    let width: usize = fields.iter().map(|f| f.ty.width()).sum();
    assert_eq!(width, 12);
}

#[test]
fn resolve_type_within_type() {
    let src = r#"
TYPE "Inner"
VERSION : 0.1
    STRUCT
        V : Word;
    END_STRUCT;
END_TYPE

TYPE "Outer"
VERSION : 0.1
    STRUCT
        Left : "Inner";
        Right : "Inner";
    END_STRUCT;
END_TYPE

DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        O : "Outer";
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    let names: Vec<String> = fields.iter().map(|f| f.name()).collect();
    assert_eq!(names, ["O.Left.V", "O.Right.V"]);
}

#[test]
fn resolve_quoted_primitive_reference() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : "Int";
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let fields = flatten(&p).expect("flatten");
    assert_eq!(fields[0].ty, S7Type::Int);
}

#[test]
fn resolve_unknown_reference_fails() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : "Missing";
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let e = flatten(&p).expect_err("unknown reference");
    assert!(
        matches!(e, ResolveError::UnresolvedTypeReference(ref n) if n == "Missing"),
        "{:?}",
        e
    );
}

#[test]
fn resolve_direct_cycle_fails() {
    let src = r#"
TYPE "A"
VERSION : 0.1
    STRUCT
        x : "A";
    END_STRUCT;
END_TYPE

DATA_BLOCK "X"
VERSION : 0.1
    "A"
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    let e = flatten(&p).expect_err("self-reference");
    assert!(matches!(e, ResolveError::CyclicTypeReference(ref n) if n == "A"), "{:?}", e);
}

#[test]
fn resolve_indirect_cycle_fails() {
    let src = r#"
TYPE "A"
VERSION : 0.1
    STRUCT
        x : "B";
    END_STRUCT;
END_TYPE

TYPE "B"
VERSION : 0.1
    STRUCT
        y : "A";
    END_STRUCT;
END_TYPE

DATA_BLOCK "X"
VERSION : 0.1
    "A"
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    assert!(matches!(
        flatten(&p),
        Err(ResolveError::CyclicTypeReference(_))
    ));
}

#[test]
fn resolve_duplicate_type_name_fails() {
    let src = r#"
TYPE "A"
VERSION : 0.1
    STRUCT
        x : Bool;
    END_STRUCT;
END_TYPE

TYPE "A"
VERSION : 0.1
    STRUCT
        y : Int;
    END_STRUCT;
END_TYPE

DATA_BLOCK "X"
VERSION : 0.1
    "A"
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    assert!(matches!(flatten(&p), Err(ResolveError::DuplicateType(_))));
}

#[test]
fn resolve_inverted_array_bounds_fails() {
    let src = r#"
DATA_BLOCK "X"
VERSION : 0.1
    STRUCT
        a : Array[5..2] of Bool;
    END_STRUCT;
BEGIN
END_DATA_BLOCK
"#;
    let p = parse(src).expect("parse");
    assert!(matches!(
        flatten(&p),
        Err(ResolveError::BadArrayBounds { lower: 5, upper: 2 })
    ));
}
