//! Send/receive/reply rendezvous.
//!
//! Message buffers live in the tasks' own memory. Copies happen only while both tasks are paused in
//! the kernel.

use syscall::{ReplyError, SendError, TaskId};

use super::{Slot, TaskState};
use crate::{arch::Arch, Kernel};

/// Copy `len` bytes between the memory of two paused tasks.
unsafe fn copy_user(dst: usize, src: usize, len: usize) {
    if len != 0 {
        unsafe { core::ptr::copy(src as *const u8, dst as *mut u8, len) };
    }
}

impl<'s, A: Arch> Kernel<'s, A> {
    /// `send(tid, msg, msglen, reply, replylen)`
    pub(crate) fn sys_send(&mut self, current: Slot) {
        let Some(to) = TaskId::from_raw(self.arg(current, 0) as isize) else {
            return self.resume_with(current, SendError::ImpossibleTid.into());
        };
        let Some(receiver) = self.tasks.lookup(to).filter(|&slot| slot != current) else {
            return self.resume_with(current, SendError::InvalidTid.into());
        };
        if self.tasks.get(receiver).state == TaskState::ReceiveBlocked {
            self.rendezvous(current, receiver);
        } else {
            self.tasks.get_mut(current).state = TaskState::SendBlocked;
            self.tasks.enqueue_sender(receiver, current);
        }
    }

    /// `receive(tid_out, buf, buflen)`
    pub(crate) fn sys_receive(&mut self, current: Slot) {
        match self.tasks.dequeue_sender(current) {
            Some(sender) => self.rendezvous(sender, current),
            None => self.tasks.get_mut(current).state = TaskState::ReceiveBlocked,
        }
    }

    /// Deliver `sender`'s message. The receiver runs again; the sender waits for the reply.
    fn rendezvous(&mut self, sender: Slot, receiver: Slot) {
        let (msg, msglen) = (self.arg(sender, 1), self.arg(sender, 2));
        let (tid_out, buf, buflen) = (
            self.arg(receiver, 0),
            self.arg(receiver, 1),
            self.arg(receiver, 2),
        );
        let len = msglen.min(buflen);
        let from = self.tasks.id(sender);
        unsafe {
            copy_user(buf, msg, len);
            if tid_out != 0 {
                (tid_out as *mut TaskId).write_unaligned(from);
            }
        }
        trace!("{} -> {}: {} of {} bytes", from, self.tasks.id(receiver), len, msglen);
        self.tasks.get_mut(sender).state = TaskState::ReplyBlocked;
        self.tasks.get_mut(receiver).state = TaskState::Ready;
        self.resume_with(receiver, len as isize);
    }

    /// `reply(tid, buf, len)`
    pub(crate) fn sys_reply(&mut self, current: Slot) {
        let Some(to) = TaskId::from_raw(self.arg(current, 0) as isize) else {
            return self.resume_with(current, ReplyError::ImpossibleTid.into());
        };
        let Some(sender) = self.tasks.lookup(to).filter(|&slot| slot != current) else {
            return self.resume_with(current, ReplyError::InvalidTid.into());
        };
        if self.tasks.get(sender).state != TaskState::ReplyBlocked {
            return self.resume_with(current, ReplyError::Unsolicited.into());
        }
        let (msg, len) = (self.arg(current, 1), self.arg(current, 2));
        let (reply, replylen) = (self.arg(sender, 3), self.arg(sender, 4));
        if len > replylen {
            return self.resume_with(current, ReplyError::TooLong.into());
        }
        unsafe { copy_user(reply, msg, len) };
        self.tasks.get_mut(sender).state = TaskState::Ready;
        self.resume_with(sender, len as isize);
        self.resume_with(current, 0);
    }

    /// Retire the task. Tasks still waiting to send to it learn their send will never complete.
    pub(crate) fn sys_exit(&mut self, current: Slot) {
        while let Some(sender) = self.tasks.dequeue_sender(current) {
            self.tasks.get_mut(sender).state = TaskState::Ready;
            self.resume_with(sender, SendError::Incomplete.into());
        }
        debug!("{} exited", self.tasks.id(current));
        self.tasks.kill(current);
    }
}
