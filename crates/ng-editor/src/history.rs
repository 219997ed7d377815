//! Undo/redo command log.
//!
//! Every durable mutation is wrapped in a reversible [`Command`] and goes
//! through [`CommandLog::emit`], which executes it and records it. Undo pops
//! the most recent command and reverts it; redo replays it. Emitting after
//! an undo discards the redoable tail.
//!
//! The log is generic over the mutated target so it can be exercised
//! without a graph.

/// A reversible, replayable unit of mutation.
pub trait Command<T> {
    /// Apply the mutation. Called once, by [`CommandLog::emit`].
    fn execute(&mut self, target: &mut T);

    /// Revert what `execute` (or `redo`) did.
    fn undo(&mut self, target: &mut T);

    /// Re-apply after an undo.
    fn redo(&mut self, target: &mut T) {
        self.execute(target);
    }

    /// True when the command only changes layout (positions, sizes,
    /// frames) and not what the graph computes.
    fn is_visual(&self) -> bool {
        false
    }

    /// Short human-readable label, used in logs.
    fn describe(&self) -> String;
}

type Listener = Box<dyn FnMut(bool)>;

/// Bounded undo/redo history.
pub struct CommandLog<T> {
    undo_stack: Vec<Box<dyn Command<T>>>,
    redo_stack: Vec<Box<dyn Command<T>>>,
    /// Maximum undo depth; the oldest command is dropped beyond it.
    limit: usize,
    listeners: Vec<Listener>,
}

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

impl<T> Default for CommandLog<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl<T> std::fmt::Debug for CommandLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLog")
            .field("undo", &self.undo_stack.iter().map(|c| c.describe()).collect::<Vec<_>>())
            .field("redo", &self.redo_stack.iter().map(|c| c.describe()).collect::<Vec<_>>())
            .field("limit", &self.limit)
            .finish()
    }
}

impl<T> CommandLog<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(limit),
            redo_stack: Vec::new(),
            limit: limit.max(1),
            listeners: Vec::new(),
        }
    }

    /// Register a callback fired after every emit, undo and redo with the
    /// command's [`is_visual`](Command::is_visual) flag.
    pub fn add_listener(&mut self, listener: impl FnMut(bool) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, visual: bool) {
        for listener in &mut self.listeners {
            listener(visual);
        }
    }

    /// Record and execute a command.
    pub fn emit(&mut self, target: &mut T, command: Box<dyn Command<T>>) {
        self.redo_stack.clear();
        self.undo_stack.push(command);
        if self.undo_stack.len() > self.limit {
            let dropped = self.undo_stack.remove(0);
            log::trace!("history: dropping oldest command {:?}", dropped.describe());
        }
        let Some(command) = self.undo_stack.last_mut() else {
            return;
        };
        log::trace!("history: execute {}", command.describe());
        command.execute(target);
        let visual = command.is_visual();
        self.notify(visual);
    }

    /// Undo the last command. Returns its description, or `None` when
    /// there is nothing to undo.
    pub fn undo(&mut self, target: &mut T) -> Option<String> {
        let mut command = self.undo_stack.pop()?;
        log::trace!("history: undo {}", command.describe());
        command.undo(target);
        let desc = command.describe();
        let visual = command.is_visual();
        self.redo_stack.push(command);
        self.notify(visual);
        Some(desc)
    }

    /// Redo the last undone command.
    pub fn redo(&mut self, target: &mut T) -> Option<String> {
        let mut command = self.redo_stack.pop()?;
        log::trace!("history: redo {}", command.describe());
        command.redo(target);
        let desc = command.describe();
        let visual = command.is_visual();
        self.undo_stack.push(command);
        self.notify(visual);
        Some(desc)
    }

    /// Forget every command, e.g. after loading a new document.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of commands, undone ones included.
    pub fn len(&self) -> usize {
        self.undo_stack.len() + self.redo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position in the history: the number of commands currently applied.
    pub fn cursor(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
