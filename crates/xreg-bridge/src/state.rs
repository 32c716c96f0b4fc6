//! The startup state machine of spec §4.9:
//! `INIT -> LOADING_CONFIG -> HANDSHAKING -> READY`, with `EXIT` reachable
//! from `LOADING_CONFIG` or `HANDSHAKING` on a fatal error. Carried only for
//! structured logging of the transition; nothing reads this value back.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    Init,
    LoadingConfig,
    Handshaking,
    Ready,
    Exit,
}

impl StartupState {
    pub fn label(self) -> &'static str {
        match self {
            StartupState::Init => "INIT",
            StartupState::LoadingConfig => "LOADING_CONFIG",
            StartupState::Handshaking => "HANDSHAKING",
            StartupState::Ready => "READY",
            StartupState::Exit => "EXIT",
        }
    }
}
