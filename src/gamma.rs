/// Gamma correction applied to every color byte right before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gamma {
    /// No correction.
    #[default]
    Linear,
    /// `corrected = 255 * (value / 255) ^ factor`
    Power(f32),
}

impl Gamma {
    /// Standard 2.2 correction for perceived brightness.
    pub const STANDARD: Gamma = Gamma::Power(2.2);

    pub(crate) fn table(self) -> [u8; 256] {
        let mut table = [0u8; 256];
        for (value, entry) in table.iter_mut().enumerate() {
            *entry = match self {
                Gamma::Linear => value as u8,
                Gamma::Power(factor) => {
                    let normalized = value as f32 / 255.0;
                    (normalized.powf(factor) * 255.0 + 0.5).clamp(0.0, 255.0) as u8
                }
            };
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_is_identity() {
        let table = Gamma::Linear.table();
        assert!(table.iter().enumerate().all(|(i, &v)| i == usize::from(v)));
    }

    #[test]
    fn power_keeps_endpoints_and_is_monotonic() {
        let table = Gamma::STANDARD.table();
        assert_eq!(table[0], 0);
        assert_eq!(table[255], 255);
        assert!(table.windows(2).all(|w| w[0] <= w[1]));
        assert!(table[128] < 128);
    }

    #[test]
    fn power_one_is_identity() {
        assert_eq!(Gamma::Power(1.0).table(), Gamma::Linear.table());
    }
}
