//! Opcode definitions and per-opcode metadata.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Opcodes for the Reverie stack VM.
///
/// Serialized as SCREAMING_SNAKE_CASE strings so emitted bytecode reads
/// like an ISA listing (`{"op": "JUMP_IF_FALSE", "arg": ...}`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OpCode {
    // Stack
    Push,
    Pop,
    Dup,

    // Variables (single flat scope)
    Load,
    Store,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,

    // Logic
    Not,

    // Comparison
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,

    // Constructors
    NewArray,
    NewObject,
    CopyValue,

    // Unified indexed access (arrays, objects, strings)
    GetIndex,
    SetIndex,

    // Array / object operations
    ArrayPush,
    Slice,
    Join,
    IndexOf,
    Length,
    Keys,

    // Strings
    Substring,
    Split,
    ToUpper,
    ToLower,
    Trim,
    Repeat,
    ToString,
    ToNumber,
    TypeOf,

    // JSON
    JsonStringify,
    JsonParse,

    // Regex (pattern/flags captured verbatim in the instruction argument)
    RegexTest,
    RegexMatch,
    RegexReplace,

    // Structured iteration
    IterStart,
    IterNext,
    IterEnd,

    // Control flow (absolute targets)
    Jump,
    JumpIfFalse,
    Break,
    Continue,
    Halt,

    // Output, files, agent
    Print,
    ReadFile,
    ListFiles,
    CognitiveCall,
}

/// The argument shape an opcode requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// No argument.
    None,
    /// A literal value to push (number, string, bool, null, undefined).
    Literal,
    /// A variable name.
    Name,
    /// An element / pair count for a constructor.
    Count,
    /// An absolute instruction index.
    Target,
    /// A regex pattern/flags pair.
    Regex,
}

impl OpCode {
    /// The argument shape this opcode requires.
    pub fn arg_shape(&self) -> ArgShape {
        use OpCode::*;
        match self {
            Push => ArgShape::Literal,
            Load | Store => ArgShape::Name,
            NewArray | NewObject => ArgShape::Count,
            Jump | JumpIfFalse | Break | Continue => ArgShape::Target,
            RegexTest | RegexMatch | RegexReplace => ArgShape::Regex,
            _ => ArgShape::None,
        }
    }

    /// Fixed number of operands this opcode pops.
    ///
    /// `NewArray`/`NewObject` have a count-dependent arity; they return the
    /// fixed part (0) here and the engine derives the rest from the
    /// instruction argument.
    pub fn stack_in(&self) -> usize {
        use OpCode::*;
        match self {
            Push | Load | Jump | Break | Continue | Halt | IterNext | IterEnd => 0,
            NewArray | NewObject => 0,
            Pop | Dup | Store | Neg | Not | CopyValue | Length | Keys | ToUpper | ToLower
            | Trim | ToString | ToNumber | TypeOf | JsonStringify | JsonParse | RegexTest
            | RegexMatch | IterStart | JumpIfFalse | Print | ReadFile | ListFiles
            | CognitiveCall => 1,
            Add | Sub | Mul | Div | Mod | Lt | Gt | Le | Ge | Eq | Ne | StrictEq | StrictNe
            | GetIndex | ArrayPush | Join | IndexOf | Split | Repeat | RegexReplace => 2,
            SetIndex | Slice | Substring => 3,
        }
    }

    /// Number of values this opcode pushes on the normal path.
    pub fn stack_out(&self) -> usize {
        use OpCode::*;
        match self {
            Pop | Store | SetIndex | IterEnd | Jump | JumpIfFalse | Break | Continue | Halt
            | Print => 0,
            Dup | IterNext => 2,
            _ => 1,
        }
    }

    /// Whether this opcode carries a jump target.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            OpCode::Jump | OpCode::JumpIfFalse | OpCode::Break | OpCode::Continue
        )
    }
}
