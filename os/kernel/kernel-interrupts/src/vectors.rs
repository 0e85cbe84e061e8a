//! Vector numbers and the CPU exception catalogue.

pub const DIVIDE_ERROR: u8 = 0;
pub const DEBUG: u8 = 1;
pub const NMI: u8 = 2;
pub const BREAKPOINT: u8 = 3;
pub const OVERFLOW: u8 = 4;
pub const BOUND_RANGE: u8 = 5;
pub const INVALID_OPCODE: u8 = 6;
pub const DEVICE_NOT_AVAILABLE: u8 = 7;
pub const DOUBLE_FAULT: u8 = 8;
pub const COPROCESSOR_SEGMENT_OVERRUN: u8 = 9;
pub const INVALID_TSS: u8 = 10;
pub const SEGMENT_NOT_PRESENT: u8 = 11;
pub const STACK_SEGMENT_FAULT: u8 = 12;
pub const GENERAL_PROTECTION: u8 = 13;
pub const PAGE_FAULT: u8 = 14;
pub const X87_FLOATING_POINT: u8 = 16;
pub const ALIGNMENT_CHECK: u8 = 17;
pub const MACHINE_CHECK: u8 = 18;
pub const SIMD_FLOATING_POINT: u8 = 19;
pub const VIRTUALIZATION: u8 = 20;
pub const CONTROL_PROTECTION: u8 = 21;

/// Vectors `0..EXCEPTION_COUNT` are wired to fatal handlers.
pub const EXCEPTION_COUNT: usize = 22;

/// First vector of the primary PIC after remapping.
pub const PIC1_OFFSET: u8 = 32;
/// First vector of the secondary PIC after remapping.
pub const PIC2_OFFSET: u8 = 40;

/// PS/2 keyboard (IRQ 1).
pub const KEYBOARD: u8 = PIC1_OFFSET + 1;

/// `int 0x80` system call gate.
pub const SYSCALL: u8 = 0x80;

const EXCEPTION_NAMES: [&str; EXCEPTION_COUNT] = [
    "#DE divide error",
    "#DB debug",
    "NMI",
    "#BP breakpoint",
    "#OF overflow",
    "#BR bound range exceeded",
    "#UD invalid opcode",
    "#NM device not available",
    "#DF double fault",
    "coprocessor segment overrun",
    "#TS invalid TSS",
    "#NP segment not present",
    "#SS stack-segment fault",
    "#GP general protection fault",
    "#PF page fault",
    "reserved",
    "#MF x87 floating-point",
    "#AC alignment check",
    "#MC machine check",
    "#XM SIMD floating-point",
    "#VE virtualization",
    "#CP control protection",
];

/// Human-readable name of `vector`.
#[must_use]
pub const fn name(vector: u8) -> &'static str {
    match vector {
        v if (v as usize) < EXCEPTION_COUNT => EXCEPTION_NAMES[v as usize],
        KEYBOARD => "keyboard",
        SYSCALL => "syscall",
        PIC1_OFFSET..=47 => "hardware interrupt",
        _ => "unassigned",
    }
}

/// Whether the CPU pushes an error code before entering the handler.
#[must_use]
pub const fn has_error_code(vector: u8) -> bool {
    matches!(
        vector,
        DOUBLE_FAULT
            | INVALID_TSS
            | SEGMENT_NOT_PRESENT
            | STACK_SEGMENT_FAULT
            | GENERAL_PROTECTION
            | PAGE_FAULT
            | ALIGNMENT_CHECK
            | CONTROL_PROTECTION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_vectors() {
        let with_code: Vec<u8> = (0..EXCEPTION_COUNT as u8)
            .filter(|&v| has_error_code(v))
            .collect();
        assert_eq!(with_code, [8, 10, 11, 12, 13, 14, 17, 21]);
    }

    #[test]
    fn names() {
        assert_eq!(name(PAGE_FAULT), "#PF page fault");
        assert_eq!(name(KEYBOARD), "keyboard");
        assert_eq!(name(SYSCALL), "syscall");
        assert_eq!(name(45), "hardware interrupt");
        assert_eq!(name(200), "unassigned");
    }
}
