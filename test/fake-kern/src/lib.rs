// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fake kernel for running driver tasks on a development host.
//!
//! Each task is an ordinary thread holding a [`FakeTask`]; all of them share
//! one [`FakeKernel`], which implements the message transport, leases, the
//! OS clock and interrupt lines behind a single mutex. Blocking operations
//! wait on a condition variable.
//!
//! # Interrupt lines
//!
//! Lines are level-triggered, like the peripheral interrupts they stand in
//! for: a simulated device drives its line high while its status flag is set
//! and low once the driver clears it ([`FakeKernel::set_level`]). A line
//! delivers one `INTERRUPT` message when it is both armed and high, and is
//! masked by that delivery. Rearming a line that is still high delivers
//! again straight away, which is what happens to a driver that rearms before
//! clearing its device.
//!
//! # Deadlocks
//!
//! A task that stays blocked for longer than [`BLOCK_LIMIT`] panics rather
//! than hanging the test run.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use userlib::{
    Fault, IrqLine, Kernel, Kind, LeaseError, Message, Source, TaskId,
};

/// How long any one blocking call may wait before we call it a deadlock.
pub const BLOCK_LIMIT: Duration = Duration::from_secs(10);

/// Something observable that happened inside the fake kernel, in order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Sent { from: TaskId, to: TaskId, msg: Message },
    Received { by: TaskId, msg: Message },
    /// `by` entered `receive_timeout`, giving up at OS time `deadline`.
    TimedWait { by: TaskId, deadline: u32 },
    Armed(IrqLine),
    Rearmed(IrqLine),
    Level { line: IrqLine, high: bool },
    Delivered { line: IrqLine, to: TaskId },
    Tick(u32),
    Halted(Fault),
}

#[derive(Copy, Clone, Debug, Default)]
struct Line {
    owner: Option<TaskId>,
    armed: bool,
    high: bool,
    delivered: usize,
}

#[derive(Default)]
struct State {
    /// Undelivered messages in send order, with their destinations.
    queue: Vec<(TaskId, Message)>,
    /// Buffers lent by tasks currently blocked in `request_with_lease`.
    leases: HashMap<TaskId, Vec<u8>>,
    lines: HashMap<IrqLine, Line>,
    clock: u32,
    log: Vec<Event>,
    halted: Option<Fault>,
}

impl State {
    fn post(&mut self, from: TaskId, to: TaskId, mut msg: Message) {
        msg.sender = from;
        self.queue.push((to, msg));
        self.log.push(Event::Sent { from, to, msg });
    }

    fn take(&mut self, me: TaskId, source: Source) -> Option<Message> {
        let i = self
            .queue
            .iter()
            .position(|(to, m)| *to == me && source.admits(m.sender))?;
        let msg = self.queue.remove(i).1;
        self.log.push(Event::Received { by: me, msg });
        Some(msg)
    }

    /// Delivers on `line` if it is armed and high.
    fn poll_line(&mut self, line: IrqLine) {
        let Some(l) = self.lines.get_mut(&line) else {
            return;
        };
        let Some(owner) = l.owner else {
            return;
        };
        if l.armed && l.high {
            l.armed = false;
            l.delivered += 1;
            self.log.push(Event::Delivered { line, to: owner });
            let msg = Message::with_args(Kind::INTERRUPT, line.0.into(), 0);
            self.post(TaskId::HARDWARE, owner, msg);
        }
    }
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

/// Handle on the whole fake system. Cheap to clone.
#[derive(Clone)]
pub struct FakeKernel {
    shared: Arc<Shared>,
}

impl Default for FakeKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeKernel {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Makes the kernel-facing handle for task `id`.
    pub fn task(&self, id: TaskId) -> FakeTask {
        FakeTask {
            id,
            kernel: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking task (e.g. one that halted) poisons the lock; the
        // state is still consistent for our purposes.
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Waits until `ready` holds, or panics with `what` after
    /// `BLOCK_LIMIT`.
    fn block_until<'a, T>(
        &'a self,
        mut st: MutexGuard<'a, State>,
        what: &dyn Fn() -> String,
        mut ready: impl FnMut(&mut State) -> Option<T>,
    ) -> (MutexGuard<'a, State>, T) {
        let limit = Instant::now() + BLOCK_LIMIT;
        loop {
            if let Some(t) = ready(&mut st) {
                return (st, t);
            }
            let now = Instant::now();
            if now >= limit {
                drop(st);
                panic!("blocked too long: {}", what());
            }
            st = self
                .shared
                .wake
                .wait_timeout(st, limit - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
    }

    fn notify(&self) {
        self.shared.wake.notify_all();
    }

    /// Drives `line` high or low on behalf of a simulated device.
    pub fn set_level(&self, line: IrqLine, high: bool) {
        let mut st = self.lock();
        let l = st.lines.entry(line).or_default();
        if l.high == high {
            return;
        }
        l.high = high;
        st.log.push(Event::Level { line, high });
        st.poll_line(line);
        drop(st);
        self.notify();
    }

    /// Injects a message as if `from` had sent it.
    pub fn inject(&self, from: TaskId, to: TaskId, msg: Message) {
        self.lock().post(from, to, msg);
        self.notify();
    }

    /// Number of messages waiting to be received by `task`.
    pub fn pending_for(&self, task: TaskId) -> usize {
        self.lock().queue.iter().filter(|(to, _)| *to == task).count()
    }

    /// Blocks until `task` has at least `n` messages waiting.
    pub fn wait_pending(&self, task: TaskId, n: usize) {
        let st = self.lock();
        self.block_until(
            st,
            &|| format!("waiting for {n} messages to {task:?}"),
            |st| {
                let have = st.queue.iter().filter(|(to, _)| *to == task).count();
                (have >= n).then_some(())
            },
        );
    }

    /// Blocks until `pred` holds of the event log.
    pub fn wait_for(&self, what: &str, pred: impl Fn(&[Event]) -> bool) {
        let st = self.lock();
        self.block_until(st, &|| format!("waiting for {what}"), |st| {
            pred(&st.log).then_some(())
        });
    }

    pub fn is_armed(&self, line: IrqLine) -> bool {
        self.lock().lines.get(&line).is_some_and(|l| l.armed)
    }

    /// Blocks until `line` has been armed (or rearmed) by its owner.
    pub fn wait_armed(&self, line: IrqLine) {
        let st = self.lock();
        self.block_until(
            st,
            &|| format!("waiting for {line:?} to be armed"),
            |st| st.lines.get(&line).is_some_and(|l| l.armed).then_some(()),
        );
    }

    /// Number of `INTERRUPT` messages delivered on `line` so far.
    pub fn deliveries(&self, line: IrqLine) -> usize {
        self.lock().lines.get(&line).map_or(0, |l| l.delivered)
    }

    pub fn now(&self) -> u32 {
        self.lock().clock
    }

    pub fn halted(&self) -> Option<Fault> {
        self.lock().halted
    }

    /// A copy of everything that has happened so far.
    pub fn log(&self) -> Vec<Event> {
        self.lock().log.clone()
    }

    /// Messages sent to `to`, in send order.
    pub fn sent_to(&self, to: TaskId) -> Vec<Message> {
        self.lock()
            .log
            .iter()
            .filter_map(|e| match e {
                Event::Sent { to: t, msg, .. } if *t == to => Some(*msg),
                _ => None,
            })
            .collect()
    }
}

/// One task's view of the fake kernel.
pub struct FakeTask {
    id: TaskId,
    kernel: FakeKernel,
}

impl FakeTask {
    pub fn id(&self) -> TaskId {
        self.id
    }

    fn wait_message<'a>(
        &'a self,
        st: MutexGuard<'a, State>,
        source: Source,
    ) -> (MutexGuard<'a, State>, Message) {
        let me = self.id;
        self.kernel.block_until(
            st,
            &|| format!("{me:?} in receive({source:?})"),
            |st| st.take(me, source),
        )
    }
}

impl Kernel for FakeTask {
    fn send(&mut self, dest: TaskId, msg: Message) {
        self.kernel.lock().post(self.id, dest, msg);
        self.kernel.notify();
    }

    fn receive(&mut self, source: Source) -> Message {
        let st = self.kernel.lock();
        self.wait_message(st, source).1
    }

    fn receive_timeout(&mut self, source: Source, ticks: u32) -> Message {
        let me = self.id;
        let mut st = self.kernel.lock();
        let deadline = st.clock.wrapping_add(ticks);
        st.log.push(Event::TimedWait { by: me, deadline });
        self.kernel
            .block_until(
                st,
                &|| format!("{me:?} in receive_timeout({source:?})"),
                |st| {
                    if let Some(m) = st.take(me, source) {
                        Some(m)
                    } else if (st.clock.wrapping_sub(deadline) as i32) >= 0 {
                        let mut m = Message::new(Kind::TIMEOUT);
                        m.sender = TaskId::KERNEL;
                        Some(m)
                    } else {
                        None
                    }
                },
            )
            .1
    }

    fn request_with_lease(
        &mut self,
        dest: TaskId,
        mut msg: Message,
        lease: &mut [u8],
    ) -> Message {
        let mut st = self.kernel.lock();
        st.leases.insert(self.id, lease.to_vec());
        msg.lease_len = lease.len();
        st.post(self.id, dest, msg);
        self.kernel.notify();

        let (mut st, reply) = self.wait_message(st, Source::Task(dest));
        if let Some(data) = st.leases.remove(&self.id) {
            lease.copy_from_slice(&data);
        }
        reply
    }

    fn write_lease(
        &mut self,
        lender: TaskId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), LeaseError> {
        let mut st = self.kernel.lock();
        let lease = st.leases.get_mut(&lender).ok_or(LeaseError::WentAway)?;
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= lease.len())
            .ok_or(LeaseError::OutOfRange)?;
        lease[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn arm(&mut self, line: IrqLine) {
        let mut st = self.kernel.lock();
        let l = st.lines.entry(line).or_default();
        l.owner = Some(self.id);
        l.armed = true;
        st.log.push(Event::Armed(line));
        st.poll_line(line);
        drop(st);
        self.kernel.notify();
    }

    fn rearm(&mut self, line: IrqLine) {
        let mut st = self.kernel.lock();
        let Some(l) = st.lines.get_mut(&line) else {
            drop(st);
            panic!("{:?} rearmed {line:?} without arming it", self.id);
        };
        if l.owner != Some(self.id) {
            let owner = l.owner;
            drop(st);
            panic!("{:?} rearmed {line:?}, owned by {owner:?}", self.id);
        }
        if !l.armed {
            l.armed = true;
            st.log.push(Event::Rearmed(line));
            st.poll_line(line);
        }
        drop(st);
        self.kernel.notify();
    }

    fn tick(&mut self, elapsed: u32) {
        let mut st = self.kernel.lock();
        st.clock = st.clock.wrapping_add(elapsed);
        let now = st.clock;
        st.log.push(Event::Tick(now));
        drop(st);
        self.kernel.notify();
    }

    fn halt(&mut self, fault: Fault) -> ! {
        let mut st = self.kernel.lock();
        st.halted = Some(fault);
        st.log.push(Event::Halted(fault));
        drop(st);
        self.kernel.notify();
        panic!("system halted by {:?}: {fault:?}", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const LINE: IrqLine = IrqLine(3);
    const DRIVER: TaskId = TaskId(1);
    const CLIENT: TaskId = TaskId(2);

    #[test]
    fn one_delivery_per_arm() {
        let k = FakeKernel::new();
        let mut drv = k.task(DRIVER);

        drv.arm(LINE);
        k.set_level(LINE, true);
        assert_eq!(k.deliveries(LINE), 1);
        assert!(!k.is_armed(LINE));

        // A second event before rearm: the device clears and re-raises its
        // flag, but the line is masked.
        k.set_level(LINE, false);
        k.set_level(LINE, true);
        k.set_level(LINE, false);
        assert_eq!(k.deliveries(LINE), 1);

        let m = drv.receive(Source::Hardware);
        assert_eq!(m.kind, Kind::INTERRUPT);
        assert_eq!(m.sender, TaskId::HARDWARE);
        assert_eq!(m.args[0], 3);
        assert_eq!(k.pending_for(DRIVER), 0);

        drv.rearm(LINE);
        assert!(k.is_armed(LINE));
        assert_eq!(k.deliveries(LINE), 1);
    }

    #[test]
    fn rearm_is_idempotent() {
        let k = FakeKernel::new();
        let mut drv = k.task(DRIVER);

        drv.arm(LINE);
        drv.rearm(LINE);
        drv.rearm(LINE);
        k.set_level(LINE, true);
        assert_eq!(k.deliveries(LINE), 1);
        assert_eq!(k.pending_for(DRIVER), 1);
    }

    #[test]
    fn rearming_a_high_line_redelivers() {
        let k = FakeKernel::new();
        let mut drv = k.task(DRIVER);

        drv.arm(LINE);
        k.set_level(LINE, true);
        drv.receive(Source::Hardware);

        // Status never cleared.
        drv.rearm(LINE);
        assert_eq!(k.deliveries(LINE), 2);
    }

    #[test]
    fn closed_receive_skips_other_senders() {
        let k = FakeKernel::new();
        let mut drv = k.task(DRIVER);

        k.inject(CLIENT, DRIVER, Message::new(Kind::REQUEST));
        k.inject(TaskId::HARDWARE, DRIVER, Message::new(Kind::INTERRUPT));

        assert_eq!(drv.receive(Source::Hardware).kind, Kind::INTERRUPT);
        assert_eq!(drv.receive(Source::Any).sender, CLIENT);
    }

    #[test]
    fn request_with_lease_round_trip() {
        let k = FakeKernel::new();
        let mut drv = k.task(DRIVER);
        let mut client = k.task(CLIENT);

        let server = thread::spawn(move || {
            let m = drv.receive(Source::Any);
            assert_eq!(m.lease_len, 4);
            assert_eq!(
                drv.write_lease(m.sender, 2, &[1, 2, 3]),
                Err(LeaseError::OutOfRange)
            );
            assert_eq!(
                drv.write_lease(TaskId(9), 0, &[1]),
                Err(LeaseError::WentAway)
            );
            drv.write_lease(m.sender, 1, &[7, 8]).unwrap();
            drv.send(m.sender, Message::ok(0));
        });

        let mut buf = [0u8; 4];
        let reply =
            client.request_with_lease(DRIVER, Message::new(Kind::REQUEST), &mut buf);
        assert_eq!(reply.kind, Kind::OK);
        assert_eq!(buf, [0, 7, 8, 0]);
        server.join().unwrap();

        // Returned with the reply.
        let mut drv = k.task(DRIVER);
        assert_eq!(drv.write_lease(CLIENT, 0, &[1]), Err(LeaseError::WentAway));
    }

    #[test]
    fn receive_timeout_follows_os_clock() {
        let k = FakeKernel::new();
        let mut waiter = k.task(CLIENT);
        let mut ticker = k.task(DRIVER);

        let t = thread::spawn(move || waiter.receive_timeout(Source::Any, 10));
        k.wait_for("waiter to block", |log| {
            log.contains(&Event::TimedWait {
                by: CLIENT,
                deadline: 10,
            })
        });

        ticker.tick(5);
        ticker.tick(4);
        assert!(!t.is_finished());
        ticker.tick(1);
        let m = t.join().unwrap();
        assert_eq!(m.kind, Kind::TIMEOUT);
        assert_eq!(m.sender, TaskId::KERNEL);
        assert_eq!(k.now(), 10);
    }

    #[test]
    fn receive_timeout_prefers_messages() {
        let k = FakeKernel::new();
        let mut waiter = k.task(CLIENT);

        k.inject(DRIVER, CLIENT, Message::new(Kind::PING));
        assert_eq!(waiter.receive_timeout(Source::Any, 0).kind, Kind::PING);
        assert_eq!(waiter.receive_timeout(Source::Any, 0).kind, Kind::TIMEOUT);
    }
}
