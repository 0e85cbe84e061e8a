use crate::frame::SyscallFrame;
use crate::{SYSCALL_FAILED, SyscallContext, SyscallError, Sysno};
use kernel_info::memory::{INIT_MODULE_NAME, PAGE_SIZE};
use kernel_vmem::{VirtualAddress, VmemError};
use log::{debug, trace, warn};
use stdlib::syscall_abi::MAX_EXEC_NAME;

/// Backspace, as delivered by the keyboard.
const BACKSPACE: u8 = 8;

/// A decoded system call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Syscall {
    Read { fd: u64, buf: VirtualAddress, count: u64 },
    Write { fd: u64, buf: VirtualAddress, count: u64 },
    Mmap { addr: VirtualAddress, length: u64 },
    Exec { name: VirtualAddress, len: u64 },
    Exit { status: u64 },
}

impl Syscall {
    /// Decodes number and arguments.
    ///
    /// # Errors
    /// [`SyscallError::UnknownSyscall`] for numbers outside the table.
    pub fn decode(number: u64, args: [u64; 6]) -> Result<Self, SyscallError> {
        let sysno = Sysno::try_from(number).map_err(SyscallError::UnknownSyscall)?;
        let [a0, a1, a2, ..] = args;
        Ok(match sysno {
            Sysno::Read => Self::Read {
                fd: a0,
                buf: VirtualAddress::new(a1),
                count: a2,
            },
            Sysno::Write => Self::Write {
                fd: a0,
                buf: VirtualAddress::new(a1),
                count: a2,
            },
            // prot, flags, fd and offset are accepted and ignored
            Sysno::Mmap => Self::Mmap {
                addr: VirtualAddress::new(a0),
                length: a1,
            },
            Sysno::Exec => Self::Exec {
                name: VirtualAddress::new(a0),
                len: a1,
            },
            Sysno::Exit => Self::Exit { status: a0 },
        })
    }
}

/// What the trampoline does after the call.
enum Completion {
    /// Return `value` in `rax` to the caller.
    Return(u64),
    /// Continue in a freshly loaded program.
    Replace(VirtualAddress),
}

/// Runs the system call described by `frame` and stores its outcome in it.
///
/// On a successful `exec`/`exit` the frame is rewritten so that returning
/// from the trap enters the new program.
pub fn dispatch<C: SyscallContext + ?Sized>(ctx: &mut C, frame: &mut SyscallFrame) {
    let outcome = Syscall::decode(frame.number(), frame.args()).and_then(|call| {
        trace!("{call:?}");
        run(ctx, call)
    });

    match outcome {
        Ok(Completion::Return(value)) => frame.set_return(value),
        Ok(Completion::Replace(entry)) => frame.restart_at(entry),
        Err(e) => {
            warn!("syscall {} failed: {e}", frame.number());
            frame.set_return(SYSCALL_FAILED);
        }
    }
}

fn run<C: SyscallContext + ?Sized>(ctx: &mut C, call: Syscall) -> Result<Completion, SyscallError> {
    match call {
        Syscall::Read { fd: _, buf, count } => sys_read(ctx, buf, count).map(Completion::Return),
        Syscall::Write { fd: _, buf, count } => sys_write(ctx, buf, count).map(Completion::Return),
        Syscall::Mmap { addr, length } => sys_mmap(ctx, addr, length).map(Completion::Return),
        Syscall::Exec { name, len } => sys_exec(ctx, name, len).map(Completion::Replace),
        Syscall::Exit { status } => {
            debug!("exit({status}), returning to {INIT_MODULE_NAME}");
            ctx.load_module(INIT_MODULE_NAME).map(Completion::Replace)
        }
    }
}

/// Blocks until `count` bytes are stored; backspace steps back one byte.
fn sys_read<C: SyscallContext + ?Sized>(
    ctx: &mut C,
    buf: VirtualAddress,
    count: u64,
) -> Result<u64, SyscallError> {
    let mut index = 0u64;
    while index < count {
        let ch = loop {
            if let Some(ch) = ctx.try_read_char() {
                break ch;
            }
            ctx.wait_for_input();
        };

        if ch == BACKSPACE {
            index = index.saturating_sub(1);
        } else {
            ctx.copy_to_user(buf + index, &[ch])?;
            index += 1;
        }
    }
    Ok(index)
}

fn sys_write<C: SyscallContext + ?Sized>(
    ctx: &mut C,
    buf: VirtualAddress,
    count: u64,
) -> Result<u64, SyscallError> {
    let mut chunk = [0u8; 64];
    let mut done = 0u64;
    while done < count {
        let n = (count - done).min(chunk.len() as u64) as usize;
        ctx.copy_from_user(buf + done, &mut chunk[..n])?;
        ctx.write_output(&chunk[..n]);
        done += n as u64;
    }
    Ok(count)
}

fn sys_mmap<C: SyscallContext + ?Sized>(
    ctx: &mut C,
    addr: VirtualAddress,
    length: u64,
) -> Result<u64, SyscallError> {
    let start = addr.as_u64() / PAGE_SIZE * PAGE_SIZE;
    let end = addr
        .as_u64()
        .checked_add(length)
        .ok_or(VmemError::NotUser(addr))?;

    let mut page = start;
    while page < end {
        ctx.map_user_page(VirtualAddress::new(page))?;
        let Some(next) = page.checked_add(PAGE_SIZE) else {
            break;
        };
        page = next;
    }
    Ok(start)
}

fn sys_exec<C: SyscallContext + ?Sized>(
    ctx: &mut C,
    name: VirtualAddress,
    len: u64,
) -> Result<VirtualAddress, SyscallError> {
    let len = usize::try_from(len).map_err(|_| SyscallError::BadName)?;
    if len > MAX_EXEC_NAME {
        return Err(SyscallError::BadName);
    }
    let mut buf = [0u8; MAX_EXEC_NAME];
    ctx.copy_from_user(name, &mut buf[..len])?;
    let name = core::str::from_utf8(&buf[..len]).map_err(|_| SyscallError::BadName)?;
    debug!("exec({name})");
    ctx.load_module(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockContext;
    use kernel_info::memory::USER_STACK_TOP;

    fn frame(number: u64, args: [u64; 3]) -> SyscallFrame {
        SyscallFrame {
            rax: number,
            rdi: args[0],
            rsi: args[1],
            rdx: args[2],
            rip: 0x40_0123,
            cs: 0x23,
            rflags: 0x202,
            rsp: 0x7FFF_FFFF_E000,
            ss: 0x1B,
            ..SyscallFrame::default()
        }
    }

    #[test]
    fn write_emits_bytes_in_order() {
        let mut ctx = MockContext::default();
        ctx.poke(0x50_0000, b"hello");
        let mut f = frame(1, [1, 0x50_0000, 5]);

        dispatch(&mut ctx, &mut f);

        assert_eq!(f.rax, 5);
        assert_eq!(ctx.output, b"hello");
    }

    #[test]
    fn write_of_a_long_buffer_is_chunked() {
        let mut ctx = MockContext::default();
        let text: Vec<u8> = (0..200u8).collect();
        ctx.poke(0x50_0000, &text);
        let mut f = frame(1, [1, 0x50_0000, 200]);
        dispatch(&mut ctx, &mut f);
        assert_eq!(f.rax, 200);
        assert_eq!(ctx.output, text);
    }

    #[test]
    fn unknown_number_returns_the_sentinel() {
        let mut ctx = MockContext::default();
        let mut f = frame(99, [1, 2, 3]);
        dispatch(&mut ctx, &mut f);
        assert_eq!(f.rax, SYSCALL_FAILED);
        assert_eq!(f.rax as i64, -1);
        assert_eq!(f.rip, 0x40_0123);
    }

    #[test]
    fn read_applies_backspace() {
        let mut ctx = MockContext::default();
        ctx.input.extend(*b"ab\x08cd");
        ctx.poke(0x50_0000, &[0; 4]);
        let mut f = frame(0, [0, 0x50_0000, 3]);

        dispatch(&mut ctx, &mut f);

        assert_eq!(f.rax, 3);
        assert_eq!(ctx.peek(0x50_0000, 3), b"acd");
    }

    #[test]
    fn leading_backspace_is_floored_at_zero() {
        let mut ctx = MockContext::default();
        ctx.input.extend(*b"\x08\x08x");
        ctx.poke(0x50_0000, &[0]);
        let mut f = frame(0, [0, 0x50_0000, 1]);
        dispatch(&mut ctx, &mut f);
        assert_eq!(f.rax, 1);
        assert_eq!(ctx.peek(0x50_0000, 1), b"x");
    }

    #[test]
    fn read_blocks_until_input_arrives() {
        let mut ctx = MockContext::default();
        ctx.arrives_after_waits = vec![(3, b'q')];
        ctx.poke(0x50_0000, &[0]);
        let mut f = frame(0, [0, 0x50_0000, 1]);
        dispatch(&mut ctx, &mut f);
        assert_eq!(f.rax, 1);
        assert_eq!(ctx.waits, 3);
        assert_eq!(ctx.peek(0x50_0000, 1), b"q");
    }

    #[test]
    fn mmap_aligns_down_and_covers_the_tail() {
        let mut ctx = MockContext::default();
        let mut f = frame(2, [0x60_0FF0, 0x20, 0]);
        dispatch(&mut ctx, &mut f);

        assert_eq!(f.rax, 0x60_0000);
        assert_eq!(
            ctx.mapped,
            [VirtualAddress::new(0x60_0000), VirtualAddress::new(0x60_1000)]
        );
    }

    #[test]
    fn mmap_with_a_wrapping_length_maps_nothing() {
        let mut ctx = MockContext::default();
        let mut f = frame(2, [0x60_0FF0, u64::MAX, 0]);
        dispatch(&mut ctx, &mut f);

        assert_eq!(f.rax, SYSCALL_FAILED);
        assert!(ctx.mapped.is_empty());
    }

    #[test]
    fn mmap_failure_returns_the_sentinel() {
        let mut ctx = MockContext {
            map_budget: Some(1),
            ..MockContext::default()
        };
        let mut f = frame(2, [0x60_0000, 0x3000, 0]);
        dispatch(&mut ctx, &mut f);
        assert_eq!(f.rax, SYSCALL_FAILED);
        assert_eq!(ctx.mapped.len(), 1);
    }

    #[test]
    fn exec_replaces_the_caller() {
        let mut ctx = MockContext::default();
        ctx.modules.push(("ls", VirtualAddress::new(0x40_1000)));
        ctx.poke(0x50_0000, b"ls");
        let mut f = frame(3, [0x50_0000, 2, 0]);
        f.rbx = 0x1234;

        dispatch(&mut ctx, &mut f);

        assert_eq!(ctx.loaded, ["ls"]);
        assert_eq!(f.rip, 0x40_1000);
        assert_eq!(f.rsp, USER_STACK_TOP);
        assert_eq!((f.rax, f.rbx), (0, 0));
        assert_eq!((f.cs, f.ss, f.rflags), (0x23, 0x1B, 0x202));
    }

    #[test]
    fn exec_of_a_missing_module_fails() {
        let mut ctx = MockContext::default();
        ctx.modules.push(("init", VirtualAddress::new(0x40_0000)));
        ctx.poke(0x50_0000, b"ini");
        let mut f = frame(3, [0x50_0000, 3, 0]);

        dispatch(&mut ctx, &mut f);

        assert_eq!(f.rax, SYSCALL_FAILED);
        assert_eq!(f.rip, 0x40_0123);
    }

    #[test]
    fn exec_with_an_unmapped_name_fails() {
        let mut ctx = MockContext::default();
        let mut f = frame(3, [0x50_0000, 4, 0]);
        dispatch(&mut ctx, &mut f);
        assert_eq!(f.rax, SYSCALL_FAILED);
        assert!(ctx.loaded.is_empty());
    }

    #[test]
    fn exit_returns_to_init() {
        let mut ctx = MockContext::default();
        ctx.modules.push(("init", VirtualAddress::new(0x40_0000)));
        let mut f = frame(4, [0, 0, 0]);
        dispatch(&mut ctx, &mut f);
        assert_eq!(ctx.loaded, ["init"]);
        assert_eq!(f.rip, 0x40_0000);
    }

    #[test]
    fn decode_maps_registers() {
        assert_eq!(
            Syscall::decode(2, [0x1000, 0x20, 7, 0, u64::MAX, 0]),
            Ok(Syscall::Mmap {
                addr: VirtualAddress::new(0x1000),
                length: 0x20
            })
        );
        assert_eq!(
            Syscall::decode(5, [0; 6]),
            Err(SyscallError::UnknownSyscall(5))
        );
    }

    #[test]
    fn copy_faults_become_errors() {
        let mut ctx = MockContext::default();
        let mut f = frame(1, [1, 0x70_0000, 5]);
        dispatch(&mut ctx, &mut f);
        assert_eq!(f.rax, SYSCALL_FAILED);
        assert!(ctx.output.is_empty());
    }
}
