use ux::u2;

/// a 2 bit signal that tells the ALU Control Unit what type of instruction is being executed
pub struct ALUOp();

impl ALUOp {
    pub const LOAD_STORE_OP: u2 = u2::new(0b00);
    pub const BRANCH_OP: u2 = u2::new(0b01);
    pub const REGISTER_OP: u2 = u2::new(0b10);
    pub const IMMEDIATE_OP: u2 = u2::new(0b11);
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
/// a 4 bit signal that tells the ALU what operation to perform.
///
/// only addition and subtraction are needed by the instructions we support.
pub enum ALUControl {
    ADD = 0b0010,
    SUB = 0b0110,
}

/// This function mimics the ALU Control Unit in a risc-v processor, it takes in the ALU operation signal and returns the ALU control signal.
///
/// Since every register-register and register-immediate instruction we support is an addition, the funct3 and funct7 fields
/// are not consulted. It is an implementation of the following Verilog module:
///
/// ```verilog,ignore
/// module ALUControl(
///     input [1:0] Aluop,
///     output reg [3:0] Control
/// );
///     always @(*)
///     begin
///         case (Aluop)
///             2'b00 : Control <= 4'b0010; // sw
///             2'b01 : Control <= 4'b0110; // beq
///             2'b10 : Control <= 4'b0010; // add
///             2'b11 : Control <= 4'b0010; // addi
///         endcase
///     end
/// endmodule
/// ```
pub fn alu_control_unit(alu_op: u2) -> ALUControl {
    match u8::from(alu_op) {
        0b00 | 0b10 | 0b11 => ALUControl::ADD,
        0b01 => ALUControl::SUB,
        _ => unreachable!(),
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ALUOutput {
    pub result: u32,
    /// set when the result is zero, used by the branch logic to test for equality
    pub zero: bool,
}

/// The ALU itself. Arithmetic wraps, as it does in hardware.
pub fn alu(control: ALUControl, a: u32, b: u32) -> ALUOutput {
    let result = match control {
        ALUControl::ADD => a.wrapping_add(b),
        ALUControl::SUB => a.wrapping_sub(b),
    };
    ALUOutput {
        result,
        zero: result == 0,
    }
}
