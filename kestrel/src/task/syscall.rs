use syscall::{Syscall, TaskId, TaskInfo, TaskInfoError};

use super::{Priority, Slot, Spawn};
use crate::{
    arch::{Arch, ArchContext, Timer, Trap},
    Kernel,
};

impl<'s, A: Arch> Kernel<'s, A> {
    /// Set the value `slot`'s pending syscall returns and make it runnable.
    #[inline]
    pub(crate) fn resume_with(&mut self, slot: Slot, value: isize) {
        self.tasks.get_mut(slot).context.set_return(value);
        self.schedule(slot);
    }

    #[inline]
    pub(crate) fn arg(&self, slot: Slot, index: usize) -> usize {
        self.tasks.get(slot).context.arg(index)
    }

    pub(crate) fn dispatch(&mut self, current: Slot, trap: Trap) {
        let syscall = match trap {
            Trap::Interrupt => Syscall::Interrupt,
            Trap::Syscall(n) => match Syscall::from_usize(n) {
                Some(s) if s != Syscall::Interrupt => s,
                _ => self.fatal(format_args!(
                    "unknown syscall {} from {}",
                    n,
                    self.tasks.id(current)
                )),
            },
        };
        self.trace(current, syscall);
        match syscall {
            Syscall::Create => self.sys_create(current),
            Syscall::Pass => self.resume_with(current, 0),
            Syscall::Exit => self.sys_exit(current),
            Syscall::MyTid => {
                let tid = self.tasks.id(current);
                self.resume_with(current, tid.0 as isize)
            }
            Syscall::MyParentTid => {
                let parent = self.tasks.get(current).parent;
                self.resume_with(current, parent.0 as isize)
            }
            Syscall::Send => self.sys_send(current),
            Syscall::Receive => self.sys_receive(current),
            Syscall::Reply => self.sys_reply(current),
            Syscall::Await => self.sys_await(current),
            Syscall::Rand => {
                let value = self.prng.next_u32() & 0x7fff_ffff;
                self.resume_with(current, value as isize)
            }
            Syscall::ShouldIdle => {
                let waiting = self.events.waiting();
                self.resume_with(current, waiting as isize)
            }
            Syscall::TaskInfo => self.sys_task_info(current),
            Syscall::IdlePermille => {
                let permille = self.idle_permille();
                self.resume_with(current, permille as isize)
            }
            Syscall::Halt => {
                info!("{} halted the kernel", self.tasks.id(current));
                self.running = false;
            }
            Syscall::Interrupt => self.handle_interrupt(current),
        }
    }

    fn sys_create(&mut self, current: Slot) {
        let (priority, entry) = (self.arg(current, 0), self.arg(current, 1));
        let parent = self.tasks.id(current);
        let created = Priority::new(priority)
            .and_then(|priority| self.spawn(Spawn::new(entry, priority).parent(parent)));
        match created {
            Ok(child) => {
                let tid = self.tasks.id(child);
                self.schedule(child);
                self.resume_with(current, tid.0 as isize);
            }
            Err(e) => {
                debug!("{} create failed: {:?}", parent, e);
                self.resume_with(current, e.into());
            }
        }
    }

    fn sys_task_info(&mut self, current: Slot) {
        let (raw, out) = (self.arg(current, 0) as isize, self.arg(current, 1));
        let Some(slot) = TaskId::from_raw(raw).and_then(|tid| self.tasks.occupant(tid)) else {
            return self.resume_with(current, TaskInfoError::InvalidTid.into());
        };
        let task = self.tasks.get(slot);
        let info = TaskInfo::new(task.state, task.priority.get(), task.parent, task.user_time);
        if out != 0 {
            // The caller is paused in the kernel; `out` points into its memory.
            unsafe { (out as *mut TaskInfo).write_unaligned(info) };
        }
        self.resume_with(current, 0);
    }

    fn idle_permille(&mut self) -> u64 {
        let elapsed = self.arch.timer().micros().saturating_sub(self.boot_time);
        match self.idle {
            Some(idle) if elapsed > 0 => self.tasks.get(idle).user_time * 1000 / elapsed,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use syscall::{CreateError, TaskState};

    use crate::testing::*;

    #[test]
    fn create_reports_priority_and_capacity_errors() {
        let init = Program::new()
            .call(Syscall::Create, [31, CHILD, 0, 0, 0])
            .call(Syscall::Create, [usize::MAX, CHILD, 0, 0, 0])
            .repeat(Syscall::Create, [1, CHILD, 0, 0, 0], MAX_TASKS - 1);
        let child = Program::new().call(Syscall::Receive, [0, 0, 0, 0, 0]);
        let arch = MockArch::new().program(INIT, init).program(CHILD, child);
        let (arch, code) = run(arch, INIT, 0);
        assert_eq!(code, 0);
        let returns = arch.returns(INIT);
        assert_eq!(returns[0], CreateError::InvalidPriority as isize);
        assert_eq!(returns[1], CreateError::InvalidPriority as isize);
        // Idle and init hold two slots.
        let created = &returns[2..];
        assert!(created[..MAX_TASKS - 2].iter().all(|&r| r > 0));
        assert_eq!(
            created[MAX_TASKS - 2],
            CreateError::InsufficientResources as isize
        );
    }

    #[test]
    fn child_at_equal_priority_runs_first() {
        let init = Program::new()
            .call(Syscall::Create, [4, CHILD, 0, 0, 0])
            .call(Syscall::MyTid, [0; 5]);
        let child = Program::new()
            .call(Syscall::MyParentTid, [0; 5])
            .call(Syscall::MyTid, [0; 5]);
        let arch = MockArch::new().program(INIT, init).program(CHILD, child);
        let (arch, _) = run(arch, INIT, 4);
        let init_tid = arch.returns(INIT)[1];
        let child_tid = arch.returns(INIT)[0];
        assert_eq!(arch.returns(CHILD)[0], init_tid);
        assert_eq!(arch.returns(CHILD)[1], child_tid);
        assert!(arch.order_of(CHILD, 0) < arch.order_of(INIT, 1));
    }

    #[test]
    fn root_task_is_its_own_parent() {
        let init = Program::new()
            .call(Syscall::MyTid, [0; 5])
            .call(Syscall::MyParentTid, [0; 5]);
        let (arch, _) = run(MockArch::new().program(INIT, init), INIT, 1);
        let returns = arch.returns(INIT);
        assert_eq!(returns[0], returns[1]);
    }

    #[test]
    fn pass_requeues_behind_equal_priority() {
        let init = Program::new()
            .call(Syscall::Create, [2, CHILD, 0, 0, 0])
            .call(Syscall::Pass, [0; 5])
            .call(Syscall::Pass, [0; 5]);
        let child = Program::new().call(Syscall::Pass, [0; 5]);
        let arch = MockArch::new().program(INIT, init).program(CHILD, child);
        let (arch, _) = run(arch, INIT, 2);
        assert_eq!(arch.returns(INIT)[1..], [0, 0]);
        assert!(arch.order_of(CHILD, 0) < arch.order_of(INIT, 1));
    }

    #[test]
    fn task_info_reports_states() {
        let mut info = [TaskInfo::default(); 2];
        let size = core::mem::size_of::<TaskInfo>();
        let base = info.as_mut_ptr() as usize;
        let init = Program::new()
            .call(Syscall::Create, [2, CHILD, 0, 0, 0])
            .call(Syscall::TaskInfo, [FIRST_CHILD_TID, base, 0, 0, 0])
            .call(Syscall::TaskInfo, [MAX_TASKS * 1000, 0, 0, 0, 0])
            .call(Syscall::TaskInfo, [INIT_TID, base + size, 0, 0, 0]);
        let child = Program::new().call(Syscall::Receive, [0, 0, 0, 0, 0]);
        let arch = MockArch::new().program(INIT, init).program(CHILD, child);
        let (arch, _) = run(arch, INIT, 3);
        assert_eq!(
            arch.returns(INIT),
            vec![
                FIRST_CHILD_TID as isize,
                0,
                TaskInfoError::InvalidTid as isize,
                0
            ]
        );
        assert_eq!(info[0].state(), Some(TaskState::ReceiveBlocked));
        assert_eq!(info[0].priority, 2);
        assert_eq!(info[0].parent.as_usize(), INIT_TID);
        assert_eq!(info[1].state(), Some(TaskState::Ready));
        assert!(info[1].user_time_micros > 0);
    }

    #[test]
    fn task_info_covers_exited_tasks_and_null_output() {
        let mut info = TaskInfo::default();
        // The child outranks init and exits before init asks about it.
        let init = Program::new()
            .call(Syscall::Create, [2, CHILD, 0, 0, 0])
            .call(Syscall::TaskInfo, [FIRST_CHILD_TID, addr(&mut info), 0, 0, 0])
            .call(Syscall::TaskInfo, [FIRST_CHILD_TID, 0, 0, 0, 0])
            .call(Syscall::TaskInfo, [INIT_TID, 0, 0, 0, 0]);
        let child = Program::new();
        let arch = MockArch::new().program(INIT, init).program(CHILD, child);
        let (arch, _) = run(arch, INIT, 3);
        assert_eq!(arch.returns(INIT), vec![FIRST_CHILD_TID as isize, 0, 0, 0]);
        assert_eq!(info.state(), Some(TaskState::Dead));
        assert_eq!(info.priority, 2);
        assert_eq!(info.parent.as_usize(), INIT_TID);
    }

    #[test]
    fn rand_is_seeded_and_non_negative() {
        let init = Program::new().repeat(Syscall::Rand, [0; 5], 4);
        let (arch, _) = run(MockArch::new().program(INIT, init), INIT, 1);
        let mut prng = crate::utils::prng::Prng::new(crate::config::RAND_SEED);
        let expected: Vec<isize> = (0..4)
            .map(|_| (prng.next_u32() & 0x7fff_ffff) as isize)
            .collect();
        assert_eq!(arch.returns(INIT), expected);
    }

    #[test]
    fn halt_stops_immediately() {
        let init = Program::new()
            .call(Syscall::Create, [3, CHILD, 0, 0, 0])
            .call(Syscall::Halt, [0; 5])
            .call(Syscall::Pass, [0; 5]);
        let child = Program::new().call(Syscall::Pass, [0; 5]);
        let arch = MockArch::new().program(INIT, init).program(CHILD, child);
        let (arch, code) = run(arch, INIT, 2);
        assert_eq!(code, 0);
        assert!(arch.shut_down);
        // The child was never resumed and init never returned from halt.
        assert!(arch.returns(CHILD).is_empty());
        assert_eq!(arch.returns(INIT).len(), 1);
    }

    #[test]
    fn idle_share_is_reported() {
        let init = Program::new()
            .call(Syscall::Await, [0, 0, 0, 0, 0])
            .call(Syscall::IdlePermille, [0; 5]);
        let arch = MockArch::new()
            .program(INIT, init)
            .on_idle(Stimulus::Timer);
        let (arch, _) = run(arch, INIT, 1);
        let permille = arch.returns(INIT)[1];
        assert!(permille > 0 && permille < 1000, "{}", permille);
    }

    #[test]
    #[should_panic]
    fn unknown_syscall_is_fatal() {
        let init = Program::new().raw(99, [0; 5]);
        run(MockArch::new().program(INIT, init), INIT, 1);
    }

    #[test]
    #[should_panic]
    fn interrupt_number_from_user_is_fatal() {
        let init = Program::new().call(Syscall::Interrupt, [0; 5]);
        run(MockArch::new().program(INIT, init), INIT, 1);
    }
}
