/// The idle task. Sleeps while any task awaits an event, and returns once none does.
pub extern "C" fn idle_main() {
    while syscall::should_idle() > 0 {
        interrupt::wait();
    }
}
