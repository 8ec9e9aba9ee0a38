use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

/// Cómo terminó el track actual
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Finished,
    Failed(String),
}

#[derive(Debug, Default)]
struct SignalState {
    generation: u64,
    outcome: Option<Completion>,
}

/// Canal de finalización único por sesión.
///
/// El driver local lo completa desde su callback de fin de track y el
/// nodo remoto desde el router de eventos; el loop de la sesión sólo
/// espera aquí. Cada iteración del loop lo arma con una generación nueva
/// para descartar avisos tardíos del track anterior.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    state: Mutex<SignalState>,
    notify: Notify,
}

impl CompletionSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Limpia la señal y abre una generación nueva
    pub fn arm(self: &Arc<Self>) -> CompletionToken {
        let mut state = self.state.lock();
        state.generation += 1;
        state.outcome = None;

        CompletionToken {
            signal: Arc::clone(self),
            generation: state.generation,
        }
    }

    /// Completa la generación actual, sea cual sea (ruta de eventos remotos)
    pub fn set(&self, outcome: Completion) {
        let generation = self.state.lock().generation;
        self.complete(generation, outcome);
    }

    pub fn clear(&self) {
        self.state.lock().outcome = None;
    }

    #[allow(dead_code)]
    pub fn is_set(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    /// Espera a que la generación actual se complete
    pub async fn wait(&self) -> Completion {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.state.lock().outcome.clone() {
                return outcome;
            }
            notified.await;
        }
    }

    fn complete(&self, generation: u64, outcome: Completion) -> bool {
        {
            let mut state = self.state.lock();
            if state.generation != generation || state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome);
        }
        self.notify.notify_waiters();
        true
    }
}

/// Callback de finalización atado a una generación del loop
#[derive(Debug, Clone)]
pub struct CompletionToken {
    signal: Arc<CompletionSignal>,
    generation: u64,
}

impl CompletionToken {
    /// Devuelve `false` si la señal ya fue rearmada o completada
    pub fn complete(&self, outcome: Completion) -> bool {
        self.signal.complete(self.generation, outcome)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
