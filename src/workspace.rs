use std::any::Any;
use std::cell::RefCell;
use std::thread::LocalKey;

/// A workspace that contains type-erased objects.
///
/// Element assembly keeps its scratch buffers here so that repeated calls on the same thread
/// reuse allocations. Lookups favor the type that was accessed last.
#[derive(Debug, Default)]
pub struct Workspace {
    workspaces: Vec<Box<dyn Any>>,
}

impl Workspace {
    pub fn get_or_insert_with<W, F>(&mut self, create: F) -> &mut W
    where
        W: 'static,
        F: FnOnce() -> W,
    {
        // The Vec is a stack, most recently used entry last
        let idx = match self.workspaces.iter().rposition(|ws| ws.is::<W>()) {
            Some(idx) => idx,
            None => {
                self.workspaces.push(Box::new(create()) as Box<dyn Any>);
                self.workspaces.len() - 1
            }
        };

        let last = self.workspaces.len() - 1;
        self.workspaces.swap(idx, last);

        self.workspaces[last]
            .downcast_mut()
            .expect("Internal error: Downcasting can by definition not fail")
    }

    pub fn get_or_default<W>(&mut self) -> &mut W
    where
        W: 'static + Default,
    {
        self.get_or_insert_with(Default::default)
    }
}

/// Runs `f` with the object of type `W` stored in the given thread-local workspace, creating it
/// with `W::default()` on first use.
///
/// # Panics
///
/// Panics if `f` recursively accesses the same thread-local workspace.
pub fn with_thread_local_workspace<W, R>(
    workspace: &'static LocalKey<RefCell<Workspace>>,
    f: impl FnOnce(&mut W) -> R,
) -> R
where
    W: 'static + Default,
{
    workspace.with(|refcell| {
        let mut workspace = refcell.borrow_mut();
        f(workspace.get_or_default())
    })
}
