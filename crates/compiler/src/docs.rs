//! Documentation lookups for editor hover and autocomplete
//!
//! A static table covering language keywords, the standard function
//! blocks, and every built-in function the evaluator provides. Editor
//! integrations call [`lookup`] on the identifier under the cursor and
//! [`completions`] while typing; both are case-insensitive.

/// What kind of identifier a doc entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Keyword,
    FunctionBlock,
    Function,
    DataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocEntry {
    pub name: &'static str,
    /// Pin or call signature, empty for keywords
    pub signature: &'static str,
    pub summary: &'static str,
    pub kind: DocKind,
}

/// Look up documentation for an identifier (case-insensitive)
pub fn lookup(ident: &str) -> Option<&'static DocEntry> {
    ENTRIES
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(ident))
}

/// All entries whose name starts with `prefix` (case-insensitive),
/// in table order
pub fn completions(prefix: &str) -> Vec<&'static DocEntry> {
    ENTRIES
        .iter()
        .filter(|entry| {
            entry.name.len() >= prefix.len()
                && entry.name[..prefix.len()].eq_ignore_ascii_case(prefix)
        })
        .collect()
}

macro_rules! entry {
    ($name:literal, $kind:ident, $sig:literal, $summary:literal) => {
        DocEntry {
            name: $name,
            signature: $sig,
            summary: $summary,
            kind: DocKind::$kind,
        }
    };
}

static ENTRIES: &[DocEntry] = &[
    // Control-flow keywords
    entry!("IF", Keyword, "", "Conditional execution: IF cond THEN ... ELSIF ... ELSE ... END_IF"),
    entry!("CASE", Keyword, "", "Multi-way branch on an integer selector with value and range labels"),
    entry!("FOR", Keyword, "", "Counted loop: FOR i := start TO end BY step DO ... END_FOR"),
    entry!("WHILE", Keyword, "", "Pre-tested loop: WHILE cond DO ... END_WHILE"),
    entry!("REPEAT", Keyword, "", "Post-tested loop: REPEAT ... UNTIL cond END_REPEAT"),
    entry!("EXIT", Keyword, "", "Leave the innermost enclosing loop"),
    entry!("CONTINUE", Keyword, "", "Skip to the next iteration of the innermost loop"),
    entry!("PROGRAM", Keyword, "", "Program organization unit: PROGRAM name ... END_PROGRAM"),
    entry!("VAR", Keyword, "", "Local variable block, terminated by END_VAR"),
    entry!("VAR_INPUT", Keyword, "", "Input variable block"),
    entry!("VAR_OUTPUT", Keyword, "", "Output variable block"),
    entry!("VAR_GLOBAL", Keyword, "", "Global variable block"),
    entry!("VAR_EXTERNAL", Keyword, "", "Reference to variables declared VAR_GLOBAL elsewhere"),
    entry!("CONSTANT", Keyword, "", "Marks a variable block as read-only after initialization"),
    entry!("TYPE", Keyword, "", "User type definition: STRUCT or enumeration, until END_TYPE"),
    entry!("ARRAY", Keyword, "", "Array type: ARRAY[lo..hi, ...] OF element-type"),
    // Data types
    entry!("BOOL", DataType, "", "Boolean, TRUE or FALSE"),
    entry!("INT", DataType, "", "16-bit signed integer (all integer widths share one table)"),
    entry!("DINT", DataType, "", "32-bit signed integer"),
    entry!("REAL", DataType, "", "32-bit floating point"),
    entry!("LREAL", DataType, "", "64-bit floating point"),
    entry!("TIME", DataType, "", "Duration, literal T#...; stored in milliseconds"),
    entry!("DATE", DataType, "", "Calendar date, literal D#YYYY-MM-DD"),
    entry!("TIME_OF_DAY", DataType, "", "Wall-clock time, literal TOD#HH:MM:SS[.mmm]"),
    entry!("DATE_AND_TIME", DataType, "", "Date plus time, literal DT#YYYY-MM-DD-HH:MM:SS"),
    entry!("STRING", DataType, "", "Character string, single- or double-quoted literals"),
    // Timers
    entry!("TON", FunctionBlock, "(IN: BOOL, PT: TIME) => (Q: BOOL, ET: TIME)",
        "On-delay timer: Q turns TRUE once IN has been TRUE for PT"),
    entry!("TOF", FunctionBlock, "(IN: BOOL, PT: TIME) => (Q: BOOL, ET: TIME)",
        "Off-delay timer: Q follows IN up, stays TRUE for PT after IN falls"),
    entry!("TP", FunctionBlock, "(IN: BOOL, PT: TIME) => (Q: BOOL, ET: TIME)",
        "Pulse timer: rising edge of IN emits one non-retriggerable pulse of width PT"),
    // Counters
    entry!("CTU", FunctionBlock, "(CU: BOOL, R: BOOL, PV: INT) => (QU: BOOL, CV: INT)",
        "Up counter: CV increments on rising CU; R clears; QU when CV >= PV"),
    entry!("CTD", FunctionBlock, "(CD: BOOL, LD: BOOL, PV: INT) => (QD: BOOL, CV: INT)",
        "Down counter: CV decrements on rising CD to 0; LD loads PV; QD when CV <= 0"),
    entry!("CTUD", FunctionBlock, "(CU, CD, R, LD: BOOL, PV: INT) => (QU, QD: BOOL, CV: INT)",
        "Up/down counter; R dominates LD dominates counting"),
    // Edge detectors and bistables
    entry!("R_TRIG", FunctionBlock, "(CLK: BOOL) => (Q: BOOL)",
        "Rising-edge detector: Q is TRUE for exactly one scan per rising edge"),
    entry!("F_TRIG", FunctionBlock, "(CLK: BOOL) => (Q: BOOL)",
        "Falling-edge detector: Q is TRUE for exactly one scan per falling edge"),
    entry!("SR", FunctionBlock, "(S1: BOOL, R: BOOL) => (Q1: BOOL)",
        "Set-dominant bistable: S1 sets, else R resets"),
    entry!("RS", FunctionBlock, "(S: BOOL, R1: BOOL) => (Q1: BOOL)",
        "Reset-dominant bistable: R1 resets, else S sets"),
    // Numeric functions
    entry!("ABS", Function, "ABS(IN)", "Absolute value"),
    entry!("SQRT", Function, "SQRT(IN)", "Square root; negative input yields NaN"),
    entry!("MIN", Function, "MIN(IN1, IN2, ...)", "Smallest argument"),
    entry!("MAX", Function, "MAX(IN1, IN2, ...)", "Largest argument"),
    entry!("SIN", Function, "SIN(IN)", "Sine of an angle in radians"),
    entry!("COS", Function, "COS(IN)", "Cosine of an angle in radians"),
    entry!("TAN", Function, "TAN(IN)", "Tangent of an angle in radians"),
    entry!("ASIN", Function, "ASIN(IN)", "Arc sine in radians"),
    entry!("ACOS", Function, "ACOS(IN)", "Arc cosine in radians"),
    entry!("ATAN", Function, "ATAN(IN)", "Arc tangent in radians"),
    entry!("ATAN2", Function, "ATAN2(Y, X)", "Two-argument arc tangent in radians"),
    entry!("LN", Function, "LN(IN)", "Natural logarithm; non-positive input yields NaN or -inf"),
    entry!("LOG", Function, "LOG(IN)", "Base-10 logarithm"),
    entry!("EXP", Function, "EXP(IN)", "e raised to IN"),
    entry!("EXPT", Function, "EXPT(IN1, IN2)", "IN1 raised to IN2"),
    entry!("TRUNC", Function, "TRUNC(IN)", "Truncate toward zero"),
    entry!("ROUND", Function, "ROUND(IN)", "Round to nearest integer"),
    // Selection and limiting
    entry!("SEL", Function, "SEL(G, IN0, IN1)", "Binary selector: IN1 when G is TRUE, else IN0"),
    entry!("MUX", Function, "MUX(K, IN0, ..., INn)",
        "Multiplexer: selects INk; out-of-range K falls back to IN0"),
    entry!("LIMIT", Function, "LIMIT(MN, IN, MX)", "Clamp IN into [MN, MX]"),
    // String functions (positions are 1-based)
    entry!("CONCAT", Function, "CONCAT(IN1, IN2, ...)", "Concatenate strings"),
    entry!("LEN", Function, "LEN(IN)", "String length in characters"),
    entry!("LEFT", Function, "LEFT(IN, L)", "Leftmost L characters"),
    entry!("RIGHT", Function, "RIGHT(IN, L)", "Rightmost L characters"),
    entry!("MID", Function, "MID(IN, L, P)", "L characters starting at 1-based position P"),
    entry!("FIND", Function, "FIND(IN1, IN2)",
        "1-based position of the first occurrence of IN2 in IN1; 0 when absent"),
    entry!("INSERT", Function, "INSERT(IN1, IN2, P)", "Insert IN2 into IN1 after position P"),
    entry!("DELETE", Function, "DELETE(IN, L, P)", "Delete L characters starting at position P"),
    entry!("REPLACE", Function, "REPLACE(IN1, IN2, L, P)",
        "Replace L characters of IN1 starting at P with IN2"),
];
