//! Carbon metric derivations shared by events and rollups
//!
//! All denominators of 0 yield None — an undefined metric, never a
//! division by zero or a fabricated value.

/// Grams per tonne.
pub const GRAMS_PER_TONNE: f64 = 1_000_000.0;

/// Tonnes CO2-equivalent from energy and grid intensity.
pub fn tco2e(energy_kwh: f64, intensity_g_per_kwh: f64) -> f64 {
    energy_kwh * intensity_g_per_kwh / GRAMS_PER_TONNE
}

/// Grams CO2 per 1000 tokens.
pub fn intensity_g_per_1k_tokens(tco2e: f64, tokens: u64) -> Option<f64> {
    if tokens == 0 {
        return None;
    }
    Some(tco2e * GRAMS_PER_TONNE / (tokens as f64 / 1000.0))
}

/// Grams CO2 per API call.
pub fn g_per_call(tco2e: f64, api_calls: u64) -> Option<f64> {
    if api_calls == 0 {
        return None;
    }
    Some(tco2e * GRAMS_PER_TONNE / api_calls as f64)
}

/// Tokens processed per tonne CO2-equivalent.
pub fn efficiency_tokens_per_tco2e(tokens: u64, tco2e: f64) -> Option<f64> {
    if tco2e <= 0.0 {
        return None;
    }
    Some(tokens as f64 / tco2e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tco2e_grams_to_tonnes() {
        // 1120 kWh at 400 g/kWh = 448 kg = 0.448 t
        assert!((tco2e(1120.0, 400.0) - 0.448).abs() < 1e-12);
    }

    #[test]
    fn test_intensity_per_1k_tokens() {
        // 0.5 t over 50M tokens = 500,000 g over 50,000 kilo-tokens = 10 g/1k
        let g = intensity_g_per_1k_tokens(0.5, 50_000_000).unwrap();
        assert!((g - 10.0).abs() < 1e-9);
        assert_eq!(intensity_g_per_1k_tokens(0.5, 0), None);
    }

    #[test]
    fn test_g_per_call() {
        let g = g_per_call(0.448, 100_000).unwrap();
        assert!((g - 4.48).abs() < 1e-9);
        assert_eq!(g_per_call(1.0, 0), None);
    }

    #[test]
    fn test_efficiency() {
        let e = efficiency_tokens_per_tco2e(50_000_000, 0.5).unwrap();
        assert!((e - 100_000_000.0).abs() < 1e-3);
        assert_eq!(efficiency_tokens_per_tco2e(1000, 0.0), None);
    }
}
