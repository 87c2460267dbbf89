//! Integration tests: examples of what embedding code looks like.
//!
//! Each example below corresponds to a realistic host program driving the
//! store module: placing stores after `__heap_base`, marshalling buffers
//! through linear memory and checking the `i32` results of the exports.

use whw_runtime::*;

// ═══════════════════════════════════════════════════════════════════════
// Example 1: Minimal binding: memory only, pristine store
// ═══════════════════════════════════════════════════════════════════════
//
// Host program:
//   heap = memory; ram = __heap_base; H = sizeof_whw_RandomAccess()
//   copy "hello" to ram + H + L
//   whw_write(ram, L, ram + H + L, 8, 5) == 5
//   whw_read(ram, L, ram + H + L, 8, 5) == 5

mod minimal_hello {
    use super::*;

    const L: u32 = 32;

    #[test]
    fn test_hello_roundtrip() {
        let mut memory = IsolatedMemory::<2>::try_new(2).unwrap();
        let mut inst = Instance::new(BindingMode::Minimal, 66_560, NoBacking);

        let ram = inst.heap_base() as u32;
        let h = inst.sizeof_random_access() as u32;
        let buf = ram + h + L;

        memory.write_bytes(buf as usize, b"hello").unwrap();
        assert_eq!(inst.write(&mut memory, ram, L, buf, 8, 5), 5);

        memory.write_bytes(buf as usize, &[0; 5]).unwrap();
        assert_eq!(inst.read(&mut memory, ram, L, buf, 8, 5), 5);
        assert_eq!(memory.slice(buf as usize, 5), Ok(&b"hello"[..]));
    }

    #[test]
    fn test_write_lands_in_tail() {
        let mut memory = IsolatedMemory::<1>::try_new(1).unwrap();
        let mut inst = Instance::new(BindingMode::Minimal, 1024, NoBacking);
        let ram = 1024u32;
        let buf = ram + HEADER_SIZE as u32 + L;

        memory.write_bytes(buf as usize, b"hello").unwrap();
        assert_eq!(inst.write(&mut memory, ram, L, buf, 8, 5), 5);

        let tail = ram as usize + header_size();
        assert_eq!(memory.slice(tail + 8, 5), Ok(&b"hello"[..]));
        assert!(memory.slice(tail, 8).unwrap().iter().all(|&b| b == 0));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Example 2: Formatted store with an extent window
// ═══════════════════════════════════════════════════════════════════════
//
// Host program:
//   whw_init(ram, 4096)
//   whw_write(ram, 16, buf, 10, 12)   // straddles tail end at 16

mod extent_window {
    use super::*;

    const RAM: u32 = 4096;
    const L: u32 = 16;
    const BUF: u32 = 8192;

    type Extent = ArrayBacking<8192>;

    fn setup() -> (IsolatedMemory<1>, Instance<Extent>) {
        let memory = IsolatedMemory::<1>::try_new(1).unwrap();
        let inst = Instance::new(BindingMode::Minimal, RAM, Extent::new());
        (memory, inst)
    }

    #[test]
    fn test_straddling_roundtrip() {
        let (mut memory, mut inst) = setup();
        assert_eq!(inst.init(&mut memory, RAM, 4096), 0);

        memory.write_bytes(BUF as usize, b"0123456789AB").unwrap();
        assert_eq!(inst.write(&mut memory, RAM, L, BUF, 10, 12), 12);
        assert_eq!(&inst.backing().as_slice()[..6], b"6789AB");

        let out = BUF + 64;
        assert_eq!(inst.read(&mut memory, RAM, L, out, 10, 12), 12);
        assert_eq!(memory.slice(out as usize, 12), Ok(&b"0123456789AB"[..]));
    }

    #[test]
    fn test_unwritten_extent_reads_zero() {
        let (mut memory, mut inst) = setup();
        assert_eq!(inst.init(&mut memory, RAM, 4096), 0);
        memory.write_bytes(BUF as usize, &[0xAA; 8]).unwrap();
        assert_eq!(inst.read(&mut memory, RAM, L, BUF, 1000, 8), 8);
        assert_eq!(memory.slice(BUF as usize, 8), Ok(&[0u8; 8][..]));
    }

    #[test]
    fn test_past_window_fails_both_ways() {
        let (mut memory, mut inst) = setup();
        assert_eq!(inst.init(&mut memory, RAM, 64), 0);
        let end = L + 64;
        assert_eq!(inst.write(&mut memory, RAM, L, BUF, end - 2, 4), -1);
        assert_eq!(inst.read(&mut memory, RAM, L, BUF, end - 2, 4), -1);
        assert_eq!(inst.write(&mut memory, RAM, L, BUF, end - 4, 4), 4);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Example 3: System-interface binding
// ═══════════════════════════════════════════════════════════════════════
//
// Host program:
//   wasi.initialize(instance)     // no _start to run, still required
//   then the same calls as Example 1

mod system_interface {
    use super::*;

    #[derive(Default)]
    struct Console {
        out: Vec<u8>,
    }

    impl SystemInterface for Console {
        fn args_sizes_get(&mut self) -> Result<(u32, u32), Errno> {
            Ok((1, 4))
        }

        fn environ_sizes_get(&mut self) -> Result<(u32, u32), Errno> {
            Ok((0, 0))
        }

        fn fd_write(&mut self, fd: u32, data: &[u8]) -> Result<usize, Errno> {
            if fd != 1 {
                return Err(Errno::BADF);
            }
            self.out.extend_from_slice(data);
            Ok(data.len())
        }
    }

    #[test]
    fn test_calls_before_initialize_fail() {
        let mut memory = IsolatedMemory::<1>::try_new(1).unwrap();
        let mut inst = Instance::new(BindingMode::SystemInterface, 1024, NoBacking);
        assert_eq!(inst.sizeof_random_access(), HEADER_SIZE as i32);
        assert_eq!(inst.read(&mut memory, 1024, 32, 4096, 0, 4), -2);
        assert_eq!(inst.init(&mut memory, 1024, 0), -2);
    }

    #[test]
    fn test_hello_after_initialize() {
        let mut memory = IsolatedMemory::<1>::try_new(1).unwrap();
        let mut console = Console::default();
        let mut inst = Instance::new(BindingMode::SystemInterface, 1024, NoBacking);
        inst.initialize(&mut console).unwrap();

        let buf = 1024 + HEADER_SIZE as u32 + 32;
        memory.write_bytes(buf as usize, b"hello").unwrap();
        assert_eq!(inst.write(&mut memory, 1024, 32, buf, 8, 5), 5);
        assert_eq!(inst.read(&mut memory, 1024, 32, buf, 8, 5), 5);

        let bytes = memory.slice(buf as usize, 5).unwrap();
        assert_eq!(inst.console_write(&mut console, 1, bytes), Ok(5));
        assert_eq!(console.out, b"hello");
    }
}
