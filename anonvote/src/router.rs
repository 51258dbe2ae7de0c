//! Which view is on screen, and which in-flight loads are still wanted.

/// A mounted view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    List,
    Create,

    /// `None` when the requested session could not be resolved
    Details(Option<u64>),
}

/// Something the user did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Navigation bar: voting list
    ShowList,

    /// Navigation bar: create a voting
    OpenCreate,

    /// A session picked from the list
    Select(u64),

    /// A session requested directly, possibly unresolved
    OpenDetails(Option<u64>),

    /// The create form submitted successfully
    Created,

    /// Back from the details view
    Back,

    /// Reload the current view
    Refresh,
}

/// Identifies the view generation a load was started for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Shown for `Details(None)`
pub const NO_SELECTION_PANEL: &str =
    "No voting is selected.\nType `list` to return to the voting list.";

/// Single-page view state machine.
///
/// Every transition, refresh or session change starts a new generation.
/// Results of loads started under an older generation are discarded.
pub struct Router {
    view: View,
    generation: u64,
}

impl Default for Router {
    fn default() -> Self {
        Router::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Router {
            view: View::List,
            generation: 0,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// The selected session, when the details view has one
    pub fn selected(&self) -> Option<u64> {
        match self.view {
            View::Details(id) => id,
            _ => None,
        }
    }

    /// Apply `action`. Returns the view to (re)load, or `None` if the action
    /// does not apply to the current view.
    pub fn dispatch(&mut self, action: Action) -> Option<View> {
        let next = match (self.view, action) {
            (_, Action::ShowList) => View::List,
            (_, Action::OpenCreate) => View::Create,
            (View::List, Action::Select(id)) => View::Details(Some(id)),
            (_, Action::OpenDetails(id)) => View::Details(id),
            (View::Create, Action::Created) => View::List,
            (View::Details(_), Action::Back) => View::List,
            (view, Action::Refresh) => view,
            (view, action) => {
                debug!("{:?} does not apply to {:?}", action, view);
                return None;
            }
        };

        self.view = next;
        self.generation += 1;
        Some(next)
    }

    /// The wallet session changed; loads in flight belong to the old one
    pub fn session_changed(&mut self) {
        self.generation += 1;
    }

    /// Ticket for a load started now
    pub fn ticket(&self) -> Ticket {
        Ticket(self.generation)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation
    }

    /// Pass `result` through only if `ticket` is still current
    pub fn accept<T>(&self, ticket: Ticket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            debug!("discarding stale result for {:?}", ticket);
            None
        }
    }
}
