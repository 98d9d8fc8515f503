use std::fmt;
use std::io::Write;

use parking_lot::Mutex;

use crate::host::{HostHandle, HostRefType};

/// Destination for reference-kind diagnostics.
///
/// Mirrors every event to stderr and/or an installed sink. The line format is
/// stable because leak-chasing tooling greps it:
///
/// ```text
/// +s+ strongs 812 weaks 3 obj-handle 0x7f..10/W -> new-handle 0x7f..58/S from thread 'finalizer'(4211)
/// -w- strongs 812 weaks 2 handle 0x7f..10/W from thread 'finalizer'(4211)
/// ```
pub struct RefLog {
    sink: Option<Mutex<Box<dyn Write + Send>>>,
    to_console: bool,
    with_stacks: bool,
}

impl RefLog {
    pub fn new(to_console: bool, with_stacks: bool) -> Self {
        Self {
            sink: None,
            to_console,
            with_stacks,
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn Write + Send>) {
        self.sink = Some(Mutex::new(sink));
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.to_console || self.sink.is_some()
    }

    fn write_line(&self, line: fmt::Arguments<'_>) {
        if self.to_console {
            eprintln!("{}", line);
        }
        if let Some(sink) = &self.sink {
            let mut sink = sink.lock();
            let _ = writeln!(sink, "{}", line);
            let _ = sink.flush();
        }
    }

    fn write_stack(&self) {
        if !self.with_stacks {
            return;
        }
        let snippet = stack_snippet();
        if !snippet.is_empty() {
            self.write_line(format_args!("{}", snippet.trim_end()));
        }
    }

    /// Free-form trace line, e.g. the pre-switch state dumps a bridge pass
    /// writes before changing a reference kind.
    pub fn note(&self, line: fmt::Arguments<'_>) {
        if self.enabled() {
            self.write_line(line);
        }
    }

    pub fn strong_created(
        &self,
        strongs: isize,
        weaks: isize,
        source: HostHandle,
        source_ty: HostRefType,
        created: HostHandle,
        created_ty: HostRefType,
    ) {
        if !self.enabled() {
            return;
        }
        self.write_line(format_args!(
            "+s+ strongs {} weaks {} obj-handle {:p}/{} -> new-handle {:p}/{} from thread '{}'({})",
            strongs,
            weaks,
            source,
            source_ty.as_char(),
            created,
            created_ty.as_char(),
            current_thread_name(),
            current_thread_id()
        ));
        self.write_stack();
    }

    pub fn strong_deleted(&self, strongs: isize, weaks: isize, handle: HostHandle, ty: HostRefType) {
        if !self.enabled() {
            return;
        }
        self.write_line(format_args!(
            "-s- strongs {} weaks {} handle {:p}/{} from thread '{}'({})",
            strongs,
            weaks,
            handle,
            ty.as_char(),
            current_thread_name(),
            current_thread_id()
        ));
        self.write_stack();
    }

    pub fn weak_created(
        &self,
        strongs: isize,
        weaks: isize,
        source: HostHandle,
        source_ty: HostRefType,
        created: HostHandle,
        created_ty: HostRefType,
    ) {
        if !self.enabled() {
            return;
        }
        self.write_line(format_args!(
            "+w+ strongs {} weaks {} obj-handle {:p}/{} -> new-handle {:p}/{} from thread '{}'({})",
            strongs,
            weaks,
            source,
            source_ty.as_char(),
            created,
            created_ty.as_char(),
            current_thread_name(),
            current_thread_id()
        ));
        self.write_stack();
    }

    pub fn weak_deleted(&self, strongs: isize, weaks: isize, handle: HostHandle, ty: HostRefType) {
        if !self.enabled() {
            return;
        }
        self.write_line(format_args!(
            "-w- strongs {} weaks {} handle {:p}/{} from thread '{}'({})",
            strongs,
            weaks,
            handle,
            ty.as_char(),
            current_thread_name(),
            current_thread_id()
        ));
        self.write_stack();
    }
}

fn current_thread_name() -> String {
    std::thread::current().name().unwrap_or("?").to_owned()
}

#[cfg(target_os = "linux")]
pub fn current_thread_id() -> i64 {
    unsafe { libc::syscall(libc::SYS_gettid) as i64 }
}

#[cfg(not(target_os = "linux"))]
pub fn current_thread_id() -> i64 {
    unsafe { libc::pthread_self() as i64 }
}

/// A few resolved frames of the current stack, one per line, skipping the
/// logging machinery itself.
fn stack_snippet() -> String {
    use std::fmt::Write as _;

    let bt = backtrace::Backtrace::new();
    let mut out = String::new();
    for frame in bt.frames().iter().skip(3).take(8) {
        for symbol in frame.symbols() {
            if let Some(name) = symbol.name() {
                let _ = writeln!(out, "   at {}", name);
            }
        }
    }
    out
}
