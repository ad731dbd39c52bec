//! Root certificate holder for the backend TLS session.
//!
//! The backend's root CA arrives as PEM text in the node configuration.
//! mbedTLS parses PEM only when the buffer is NUL-terminated and the
//! length passed includes the terminator, so the certificate is
//! validated and stored in that form once at startup.

use core::fmt;

use log::info;

/// Maximum certificate size (PEM format, includes headers).
pub const MAX_CERT_SIZE: usize = 4096;

const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const END: &str = "-----END CERTIFICATE-----";

/// Errors from loading a root certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertError {
    /// No PEM `CERTIFICATE` block found.
    NotPem,
    /// Certificate exceeds [`MAX_CERT_SIZE`].
    TooLarge,
    /// Embedded NUL byte would truncate the PEM for mbedTLS.
    EmbeddedNul,
}

impl fmt::Display for CertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPem => write!(f, "not a PEM certificate"),
            Self::TooLarge => write!(f, "certificate larger than {} bytes", MAX_CERT_SIZE),
            Self::EmbeddedNul => write!(f, "certificate contains a NUL byte"),
        }
    }
}

/// PEM root certificate, NUL-terminated for mbedTLS.
pub struct RootCertificate {
    pem: heapless::Vec<u8, MAX_CERT_SIZE>,
}

impl RootCertificate {
    pub fn from_pem(pem: &str) -> Result<Self, CertError> {
        let trimmed = pem.trim();
        let begin = trimmed.find(BEGIN).ok_or(CertError::NotPem)?;
        if !trimmed[begin..].contains(END) {
            return Err(CertError::NotPem);
        }
        if trimmed.as_bytes().contains(&0) {
            return Err(CertError::EmbeddedNul);
        }

        let mut buf = heapless::Vec::new();
        buf.extend_from_slice(trimmed.as_bytes())
            .map_err(|()| CertError::TooLarge)?;
        buf.push(0).map_err(|_| CertError::TooLarge)?;

        info!("CertStore: root certificate loaded ({}B)", buf.len());
        Ok(Self { pem: buf })
    }

    /// PEM bytes including the trailing NUL.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.pem
    }

    /// PEM text without the terminator.
    pub fn as_str(&self) -> &str {
        // Built from a `&str` plus one ASCII NUL.
        core::str::from_utf8(&self.pem[..self.pem.len() - 1]).unwrap_or_default()
    }

    /// `'static` copy for the ESP-IDF HTTP client, which keeps a raw
    /// pointer to the certificate for the lifetime of the connection.
    #[cfg(target_os = "espidf")]
    pub fn leak(self) -> &'static [u8] {
        Box::leak(self.pem.to_vec().into_boxed_slice())
    }
}

impl fmt::Debug for RootCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCertificate")
            .field("len", &self.pem.len())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────
