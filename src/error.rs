use thiserror::Error;

/// Errores del núcleo de reproducción.
///
/// Los handlers de Discord nunca muestran estos errores tal cual: usan
/// [`PlayerError::user_message`] para responder con una línea corta.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no se encontró nada para la búsqueda: {0}")]
    Resolution(String),

    #[error("la sesión no tiene conexión de voz")]
    NotConnected,

    #[error("la sesión está obsoleta y debe recrearse")]
    StaleSession,

    #[error("error de voz: {0}")]
    Voice(String),

    #[error("error del nodo de audio: {0}")]
    Node(String),

    #[error("índice {index} fuera de rango (cola de {len} canciones)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("volumen inválido: {0} (debe estar entre 0 y 100)")]
    InvalidVolume(i64),

    #[error("el track no es compatible con el driver de voz activo")]
    IncompatibleTrack,
}

impl PlayerError {
    /// Mensaje breve para el usuario final
    pub fn user_message(&self) -> String {
        match self {
            Self::Resolution(query) => format!("❌ No encontré nada para `{}`", query),
            Self::NotConnected => "❌ No estoy conectado a un canal de voz".to_string(),
            Self::StaleSession => "⌛ El reproductor expiró, vuelve a usar /play".to_string(),
            Self::Voice(_) | Self::IncompatibleTrack => {
                "❌ No se pudo reproducir la canción".to_string()
            }
            Self::Node(_) => "❌ El servidor de audio no responde".to_string(),
            Self::IndexOutOfRange { len, .. } => {
                format!("❌ Posición inválida, la cola tiene {} canciones", len)
            }
            Self::InvalidVolume(_) => "❌ El volumen debe estar entre 0 y 100".to_string(),
        }
    }
}

impl From<songbird::error::JoinError> for PlayerError {
    fn from(err: songbird::error::JoinError) -> Self {
        Self::Voice(err.to_string())
    }
}

impl From<songbird::error::ControlError> for PlayerError {
    fn from(err: songbird::error::ControlError) -> Self {
        Self::Voice(err.to_string())
    }
}

impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Node(err.to_string())
    }
}
