/// Render state of one polling scope (conversation list or active messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeUiState {
    Idle,
    Loading,
    Ready,
    Empty,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStatus {
    ui_state: ScopeUiState,
    has_loaded: bool,
    settled: Option<ScopeUiState>,
}

impl Default for ScopeStatus {
    fn default() -> Self {
        Self {
            ui_state: ScopeUiState::Idle,
            has_loaded: false,
            settled: None,
        }
    }
}

impl ScopeStatus {
    pub fn ui_state(&self) -> ScopeUiState {
        self.ui_state
    }

    /// Whether previously reconciled data may still be shown.
    pub fn has_data(&self) -> bool {
        self.has_loaded && self.ui_state != ScopeUiState::Error
    }

    /// Only the first load and hard errors hide the current data.
    pub fn is_blank(&self) -> bool {
        !self.has_data()
    }

    pub fn begin_load(&mut self) {
        self.ui_state = ScopeUiState::Loading;
    }

    pub fn set_loaded(&mut self, is_empty: bool) {
        let state = if is_empty {
            ScopeUiState::Empty
        } else {
            ScopeUiState::Ready
        };
        self.ui_state = state;
        self.settled = Some(state);
        self.has_loaded = true;
    }

    /// A failed refresh returns to the last settled state and keeps data visible.
    pub fn set_refresh_failed(&mut self) {
        self.ui_state = match self.settled {
            Some(state) => state,
            None => ScopeUiState::Error,
        };
    }

    /// Ends a load whose result will never be applied.
    pub fn settle(&mut self) {
        if self.ui_state == ScopeUiState::Loading {
            self.ui_state = self.settled.unwrap_or(ScopeUiState::Idle);
        }
    }

    pub fn set_error(&mut self) {
        self.ui_state = ScopeUiState::Error;
        self.settled = None;
        self.has_loaded = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
