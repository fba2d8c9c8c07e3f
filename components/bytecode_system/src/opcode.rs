//! Bytecode opcodes for the stack machine
//!
//! Every instruction is a 2-byte little-endian opcode followed by a fixed
//! list of operands. The operand list of an opcode never changes, so a
//! reader can always step over an instruction without understanding it.

/// Kind of a fixed-width operand following an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Absolute code offset (8 bytes, unsigned)
    Address,
    /// IEEE 754 double (8 bytes)
    Number,
    /// Index into the constant pool (8 bytes, unsigned)
    String,
    /// Signed 32-bit immediate (4 bytes)
    Integer,
    /// Single byte, zero is false
    Boolean,
}

impl Operand {
    /// Encoded width of this operand in bytes
    pub fn width(self) -> usize {
        match self {
            Operand::Address | Operand::Number | Operand::String => 8,
            Operand::Integer => 4,
            Operand::Boolean => 1,
        }
    }
}

macro_rules! opcodes {
    ($($(#[$doc:meta])* $variant:ident = $code:literal => $name:literal [$($operand:ident),*];)*) => {
        /// Bytecode opcodes understood by the VM
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Opcode {
            $($(#[$doc])* $variant = $code,)*
        }

        impl Opcode {
            /// Convert a raw code to an opcode
            ///
            /// Returns None if the value does not name an opcode.
            pub fn from_u16(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// Assembly mnemonic of the opcode
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }

            /// Operands that follow this opcode in the code buffer
            pub fn operands(self) -> &'static [Operand] {
                match self {
                    $(Opcode::$variant => &[$(Operand::$operand),*],)*
                }
            }

            /// Every opcode in code order
            pub fn all() -> &'static [Opcode] {
                &[$(Opcode::$variant,)*]
            }
        }
    };
}

opcodes! {
    // ===== Scopes & stack (0x00-0x0F) =====
    /// Enter a block scope
    PushScope = 0x00 => "PUSH_SCOPE" [];
    /// Leave the current block scope, running its disposers
    PopScope = 0x01 => "POP_SCOPE" [];
    /// Discard the top of stack
    Pop = 0x02 => "POP" [];
    /// Assign the top of stack to an existing binding (value stays)
    Store = 0x03 => "STORE" [String];
    /// Remember the top of stack as the result returned by HLT
    Save = 0x04 => "SAVE" [];
    /// Declare a binding in the current scope (value stays)
    Def = 0x05 => "DEF" [String];
    /// Push the value of a binding
    Load = 0x06 => "LOAD" [String];
    /// Push a structural copy of the top of stack
    Clone = 0x07 => "CLONE" [];
    /// Duplicate a stack slot; 1 names the top
    PushValue = 0x08 => "PUSH_VALUE" [Integer];
    /// Mark a binding of the current scope as const
    SetConst = 0x09 => "SET_CONST" [String];
    /// Register a binding for `using` disposal
    SetUsing = 0x0A => "SET_USING" [String];
    /// Register a binding for `await using` disposal
    SetAwaitUsing = 0x0B => "SET_AWAIT_USING" [String];

    // ===== Literals (0x10-0x1F) =====
    /// Push undefined
    PushUndefined = 0x10 => "PUSH_UNDEFINED" [];
    /// Push null
    PushNull = 0x11 => "PUSH_NULL" [];
    /// Push NaN
    PushNan = 0x12 => "PUSH_NAN" [];
    /// Push Infinity
    PushInfinity = 0x13 => "PUSH_INFINITY" [];
    /// Push the marker of a declared but uninitialized binding
    PushUninitialized = 0x14 => "PUSH_UNINITIALIZED" [];
    /// Push true
    PushTrue = 0x15 => "PUSH_TRUE" [];
    /// Push false
    PushFalse = 0x16 => "PUSH_FALSE" [];
    /// Push a number literal
    PushNumber = 0x17 => "PUSH_NUMBER" [Number];
    /// Push a string literal
    PushString = 0x18 => "PUSH_STRING" [String];
    /// Push a bigint literal given by its decimal digits
    PushBigint = 0x19 => "PUSH_BIGINT" [String];
    /// Push a new empty object
    PushObject = 0x1A => "PUSH_OBJECT" [];
    /// Push a new empty array
    PushArray = 0x1B => "PUSH_ARRAY" [];
    /// Push the receiver of the running function
    PushThis = 0x1C => "PUSH_THIS" [];

    // ===== Functions (0x20-0x2F) =====
    /// Push a new function bound to the running program
    PushFunction = 0x20 => "PUSH_FUNCTION" [];
    /// Push a new async function
    PushAsyncFunction = 0x21 => "PUSH_ASYNC_FUNCTION" [];
    /// Push a new arrow function capturing the current receiver
    PushLambda = 0x22 => "PUSH_LAMBDA" [];
    /// Push a new async arrow function
    PushAsyncLambda = 0x23 => "PUSH_ASYNC_LAMBDA" [];
    /// Push a new generator function
    PushGenerator = 0x24 => "PUSH_GENERATOR" [];
    /// Push a new async generator function
    PushAsyncGenerator = 0x25 => "PUSH_ASYNC_GENERATOR" [];
    /// Set the entry address of the function on top
    SetAddress = 0x26 => "SET_ADDRESS" [Address];
    /// Set the source text of the function on top
    SetSource = 0x27 => "SET_SOURCE" [String];
    /// Set the display name of the function on top
    SetName = 0x28 => "SET_NAME" [String];
    /// Capture a binding by name into the function on top
    SetClosure = 0x29 => "SET_CLOSURE" [String];
    /// Pop a value and bind it as the receiver of the function on top
    SetBind = 0x2A => "SET_BIND" [];
    /// Mark the function on top as async
    SetAsync = 0x2B => "SET_ASYNC" [];
    /// Mark the function on top as a generator
    SetGenerator = 0x2C => "SET_GENERATOR" [];

    // ===== Properties (0x30-0x37) =====
    /// Pop value and key, define a data property on the host below
    InitField = 0x30 => "INIT_FIELD" [];
    /// Pop setter, getter and key, define an accessor on the host below
    InitAccessor = 0x31 => "INIT_ACCESSOR" [];
    /// Pop key and host, push host[key]
    GetField = 0x32 => "GET_FIELD" [];
    /// Pop value and key, assign host[key] keeping the host
    SetField = 0x33 => "SET_FIELD" [];
    /// Pop key and host, push the result of deleting host[key]
    DelField = 0x34 => "DEL_FIELD" [];
    /// Pop a value, push an array of its enumerable string keys
    Keys = 0x35 => "KEYS" [];

    // ===== Calls (0x38-0x3F) =====
    /// Pop arguments and callee, push the call result
    Call = 0x38 => "CALL" [Integer, Integer];
    /// Pop arguments, key and host, push host[key](...arguments)
    MemberCall = 0x39 => "MEMBER_CALL" [Integer, Integer];
    /// Pop arguments and constructor, push the constructed object
    New = 0x3A => "NEW" [Integer, Integer];

    // ===== Control transfer (0x40-0x4F) =====
    /// Jump unconditionally
    Jmp = 0x40 => "JMP" [Address];
    /// Jump when the top of stack is null or undefined
    JNull = 0x41 => "JNULL" [Address];
    /// Jump when the top of stack is neither null nor undefined
    JNotNull = 0x42 => "JNOT_NULL" [Address];
    /// Jump when the top of stack is falsy
    JFalse = 0x43 => "JFALSE" [Address];
    /// Jump when the top of stack is truthy
    JTrue = 0x44 => "JTRUE" [Address];
    /// Pop a value and throw it
    Throw = 0x45 => "THROW" [];
    /// Open a protected region with catch and finally addresses (0 = none)
    TryBegin = 0x46 => "TRY_BEGIN" [Address, Address];
    /// Close the innermost protected region or finally block
    TryEnd = 0x47 => "TRY_END" [];
    /// Return the top of stack
    Ret = 0x48 => "RET" [];
    /// Stop, producing the saved result or undefined
    Hlt = 0x49 => "HLT" [];
    /// Pop a value and suspend until it settles
    Await = 0x4A => "AWAIT" [];
    /// Pop a value and suspend, handing it to the driver
    Yield = 0x4B => "YIELD" [];

    // ===== Labels (0x50-0x5F) =====
    /// Push a break target
    PushBreakLabel = 0x50 => "PUSH_BREAK_LABEL" [String, Address];
    /// Push a continue target
    PushContinueLabel = 0x51 => "PUSH_CONTINUE_LABEL" [String, Address];
    /// Pop the innermost label frame
    PopLabel = 0x52 => "POP_LABEL" [];
    /// Break to a label; an empty label names the nearest target
    Break = 0x53 => "BREAK" [String];
    /// Continue at a label; an empty label names the nearest target
    Continue = 0x54 => "CONTINUE" [String];

    // ===== Operators (0x60-0x7F) =====
    /// Loose equality
    Eq = 0x60 => "EQ" [];
    /// Loose inequality
    Ne = 0x61 => "NE" [];
    /// Strict equality
    Seq = 0x62 => "SEQ" [];
    /// Strict inequality
    Sne = 0x63 => "SNE" [];
    /// Greater than
    Gt = 0x64 => "GT" [];
    /// Less than
    Lt = 0x65 => "LT" [];
    /// Greater than or equal
    Ge = 0x66 => "GE" [];
    /// Less than or equal
    Le = 0x67 => "LE" [];
    /// Addition or string concatenation
    Add = 0x68 => "ADD" [];
    /// Subtraction
    Sub = 0x69 => "SUB" [];
    /// Multiplication
    Mul = 0x6A => "MUL" [];
    /// Division
    Div = 0x6B => "DIV" [];
    /// Remainder
    Mod = 0x6C => "MOD" [];
    /// Exponentiation
    Pow = 0x6D => "POW" [];
    /// Bitwise not
    Not = 0x6E => "NOT" [];
    /// Bitwise and
    And = 0x6F => "AND" [];
    /// Bitwise or
    Or = 0x70 => "OR" [];
    /// Bitwise xor
    Xor = 0x71 => "XOR" [];
    /// Left shift
    Shl = 0x72 => "SHL" [];
    /// Sign-propagating right shift
    Shr = 0x73 => "SHR" [];
    /// Zero-fill right shift
    Ushr = 0x74 => "USHR" [];
    /// Unary plus
    Plus = 0x75 => "PLUS" [];
    /// Unary minus
    Neg = 0x76 => "NEG" [];
    /// Logical not
    LogicalNot = 0x77 => "LOGICAL_NOT" [];
    /// Increment
    Inc = 0x78 => "INC" [];
    /// Decrement
    Dec = 0x79 => "DEC" [];
    /// Concatenate the string forms of two values
    Concat = 0x7A => "CONCAT" [];
    /// typeof operator
    Typeof = 0x7B => "TYPEOF" [];
    /// void operator
    Void = 0x7C => "VOID" [];
    /// in operator
    In = 0x7D => "IN" [];
    /// instanceof operator
    InstanceOf = 0x7E => "INSTANCE_OF" [];
}

impl Opcode {
    /// Raw code of the opcode
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Total encoded size of the instruction, opcode included
    pub fn encoded_len(self) -> usize {
        2 + self.operands().iter().map(|op| op.width()).sum::<usize>()
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
