use core::fmt;

use syscall::{CreateError, Syscall, TaskId};

use crate::{
    arch::{Arch, Timer},
    config::TRACE_DEPTH,
    event::EventTable,
    task::{Priority, PriorityScheduler, Slot, Spawn, Stack, TaskTable},
    utils::{prng::Prng, ring::RingBuffer},
};

#[derive(Debug, Clone, Copy)]
struct TraceEntry {
    tid: TaskId,
    syscall: Syscall,
}

/// All kernel state. Owned by the boot path and threaded through every handler.
pub struct Kernel<'s, A: Arch> {
    pub(crate) arch: A,
    pub(crate) tasks: TaskTable<'s, A::Context>,
    pub(crate) scheduler: PriorityScheduler,
    pub(crate) events: EventTable,
    pub(crate) prng: Prng,
    pub(crate) idle: Option<Slot>,
    pub(crate) running: bool,
    pub(crate) boot_time: u64,
    history: RingBuffer<TraceEntry, TRACE_DEPTH>,
    debug: bool,
}

impl<'s, A: Arch> Kernel<'s, A> {
    pub fn new(arch: A, stacks: &'s mut [Stack], debug: bool) -> Self {
        Self {
            arch,
            tasks: TaskTable::new(stacks),
            scheduler: PriorityScheduler::new(),
            events: EventTable::new(),
            prng: Prng::new(crate::config::RAND_SEED),
            idle: None,
            running: true,
            boot_time: 0,
            history: RingBuffer::new(),
            debug,
        }
    }

    #[inline]
    pub fn arch(&self) -> &A {
        &self.arch
    }

    /// Tear down the kernel, handing the board back.
    pub fn into_arch(self) -> A {
        self.arch
    }

    #[inline]
    pub fn tasks(&self) -> &TaskTable<'s, A::Context> {
        &self.tasks
    }

    /// Create a task. It is not scheduled.
    pub fn spawn(&mut self, spawn: Spawn) -> Result<Slot, CreateError> {
        let exit_trampoline = self.arch.exit_trampoline();
        self.tasks.create(spawn, exit_trampoline)
    }

    /// Create and schedule the idle task.
    pub fn spawn_idle(&mut self) -> Result<Slot, CreateError> {
        kassert!(self.idle.is_none());
        let slot = self.spawn(Spawn::new(self.arch.idle_entry(), Priority::IDLE))?;
        self.idle = Some(slot);
        self.schedule(slot);
        Ok(slot)
    }

    #[inline]
    pub fn schedule(&mut self, slot: Slot) {
        let priority = self.tasks.get(slot).priority;
        self.scheduler
            .schedule(&mut self.tasks.links, slot, priority);
    }

    /// Run until the system is quiescent or halted. Returns the exit code.
    pub fn run(&mut self) -> i32 {
        self.boot_time = self.arch.timer().micros();
        while self.running {
            let Some(current) = self.scheduler.next_scheduled(&mut self.tasks.links) else {
                break;
            };
            let start = self.arch.timer().micros();
            let trap = self.arch.resume(&mut self.tasks.get_mut(current).context);
            let elapsed = self.arch.timer().micros().saturating_sub(start);
            self.tasks.get_mut(current).user_time += elapsed;
            self.dispatch(current, trap);
        }
        info!("Kernel exiting");
        self.arch.shutdown();
        if self.debug {
            self.report();
        }
        0
    }

    pub(crate) fn trace(&mut self, slot: Slot, syscall: Syscall) {
        let tid = self.tasks.id(slot);
        trace!("{} -> {:?}", tid, syscall);
        self.history.push(TraceEntry { tid, syscall });
    }

    fn dump_history(&self) {
        if self.history.is_empty() {
            return;
        }
        info!("last {} syscalls:", self.history.len());
        for entry in self.history.iter() {
            info!("  {} {:?}", entry.tid, entry.syscall);
        }
    }

    /// Unrecoverable kernel state. Logs recent activity, then panics.
    pub(crate) fn fatal(&self, args: fmt::Arguments) -> ! {
        error!("{}", args);
        self.dump_history();
        panic!("{}", args)
    }

    /// Per-task runtime summary.
    fn report(&mut self) {
        let total = self
            .arch
            .timer()
            .micros()
            .saturating_sub(self.boot_time)
            .max(1);
        info!(
            "{} tasks ({} slots free), {} still ready, {} ticks, {}us elapsed",
            self.tasks.used().count(),
            self.tasks.free_slots(),
            self.scheduler.len(),
            self.events.ticks(),
            total
        );
        for (_, task) in self.tasks.used() {
            info!(
                "  {} priority {:>2} {:?} {}us ({}‰)",
                task.id.unwrap_or_default(),
                task.priority.get(),
                task.state,
                task.user_time,
                task.user_time * 1000 / total,
            );
        }
        self.dump_history();
    }
}

/// Boot entry used by boards: create the idle and first tasks, then run the loop.
pub fn boot<A: Arch>(
    arch: A,
    stacks: &mut [Stack],
    entry: usize,
    priority: usize,
    debug: bool,
) -> i32 {
    let mut kernel = Kernel::new(arch, stacks, debug);
    let started = kernel.spawn_idle().and_then(|_| {
        let priority = Priority::new(priority)?;
        kernel.spawn(Spawn::new(entry, priority))
    });
    match started {
        Ok(init) => {
            info!("Starting {} with priority {}", kernel.tasks.id(init), priority);
            kernel.schedule(init);
            kernel.run()
        }
        Err(e) => kernel.fatal(format_args!("failed to start the first task: {:?}", e)),
    }
}
