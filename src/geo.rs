//! Coordinate handling: spherical Web Mercator (EPSG:3857) projection, the
//! query tiles covering Italy, and the best-effort geographic classifier.

use std::f64::consts::PI;

/// Half the equatorial circumference of the Web Mercator sphere, in metres.
pub const ORIGIN_SHIFT: f64 = 20_037_508.342_789_244;

/// Centre of Italy, used when a feature carries no usable coordinates.
pub const ITALY_CENTER: LatLng = LatLng {
    lat: 41.9028,
    lng: 12.4964,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Inverse projection: Web Mercator metres to WGS84 degrees.
pub fn mercator_to_lat_lng(x: f64, y: f64) -> LatLng {
    let lng = x / ORIGIN_SHIFT * 180.0;
    let lat = (y / ORIGIN_SHIFT * PI).exp().atan() * 360.0 / PI - 90.0;
    LatLng { lat, lng }
}

/// Forward projection: WGS84 degrees to Web Mercator metres.
pub fn lat_lng_to_mercator(point: LatLng) -> (f64, f64) {
    let x = point.lng * ORIGIN_SHIFT / 180.0;
    let y = ((90.0 + point.lat) * PI / 360.0).tan().ln() * ORIGIN_SHIFT / PI;
    (x, y)
}

/// A lat/lng rectangle used as a spatial filter.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    pub name: &'static str,
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Envelope {
    const fn new(name: &'static str, west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            name,
            south_west: LatLng {
                lat: south,
                lng: west,
            },
            north_east: LatLng {
                lat: north,
                lng: east,
            },
        }
    }

    /// ArcGIS envelope geometry in EPSG:3857.
    pub fn to_esri_geometry(&self) -> serde_json::Value {
        let (xmin, ymin) = lat_lng_to_mercator(self.south_west);
        let (xmax, ymax) = lat_lng_to_mercator(self.north_east);
        serde_json::json!({
            "spatialReference": { "latestWkid": 3857, "wkid": 102_100 },
            "xmin": xmin,
            "ymin": ymin,
            "xmax": xmax,
            "ymax": ymax,
        })
    }
}

/// Six query tiles over Italy, aligned to the zoom-4 Mercator tile grid.
pub const ITALY_TILES: [Envelope; 6] = [
    Envelope::new("north-west", -11.25, 48.922_499, 0.0, 55.776_573),
    Envelope::new("north-east", 0.0, 48.922_499, 11.25, 55.776_573),
    Envelope::new("centre-west", -11.25, 40.979_898, 0.0, 48.922_499),
    Envelope::new("centre-east", 0.0, 40.979_898, 22.5, 55.776_573),
    Envelope::new("south-west", -11.25, 31.952_162, 0.0, 40.979_898),
    Envelope::new("south-east", 0.0, 21.943_046, 22.5, 40.979_898),
];

/// Zone, municipality and province labels for a point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    pub zone: &'static str,
    pub municipality: &'static str,
    pub province: &'static str,
}

const fn area(zone: &'static str, municipality: &'static str, province: &'static str) -> Area {
    Area {
        zone,
        municipality,
        province,
    }
}

/// Best-effort classification of a point into an Italian area.
///
/// Hand-tuned rectangles, checked in order; points near region borders are
/// routinely misclassified. Only used when the feature itself names no
/// municipality.
pub fn classify_area(point: LatLng) -> Area {
    let LatLng { lat, lng } = point;

    if (37.5..=40.5).contains(&lat) && (15.0..=17.5).contains(&lng) {
        let zone = "Regione Calabria";
        return if lat >= 39.2 && lng >= 16.2 {
            area(zone, "Cosenza", "CS")
        } else if lat <= 38.1 && lng >= 15.6 {
            area(zone, "Reggio Calabria", "RC")
        } else if (38.8..=39.2).contains(&lat) && lng >= 16.5 {
            area(zone, "Catanzaro", "CZ")
        } else if (38.5..=38.8).contains(&lat) && (16.0..=16.5).contains(&lng) {
            area(zone, "Vibo Valentia", "VV")
        } else if lat >= 39.0 && lng >= 17.0 {
            area(zone, "Crotone", "KR")
        } else {
            area(zone, "Area Calabria", "CL")
        };
    }

    if (36.0..=39.0).contains(&lat) && (12.0..=16.0).contains(&lng) {
        area("Regione Sicilia", "Area Sicilia", "SIC")
    } else if (38.0..=42.0).contains(&lat) && (8.0..=10.5).contains(&lng) {
        area("Regione Sardegna", "Area Sardegna", "SAR")
    } else if lat >= 44.0 {
        area("Italia Settentrionale", "Nord Italia", "NORD")
    } else if lat >= 41.0 {
        area("Italia Centrale", "Centro Italia", "CENTRO")
    } else {
        area("Italia Meridionale", "Sud Italia", "SUD")
    }
}

/// Region of an Italian province, by full province name or by the
/// two-letter code of the Calabrian provinces the classifier emits.
pub fn region_for_province(province: &str) -> Option<&'static str> {
    let region = match province.trim() {
        "Catanzaro" | "Cosenza" | "Crotone" | "Reggio di Calabria" | "Reggio Calabria"
        | "Vibo Valentia" | "CS" | "RC" | "CZ" | "VV" | "KR" | "CL" => "Calabria",
        "Palermo" | "Catania" | "Messina" | "Agrigento" | "Caltanissetta" | "Enna" | "Ragusa"
        | "Siracusa" | "Trapani" | "SIC" => "Sicilia",
        "Cagliari" | "Nuoro" | "Oristano" | "Sassari" | "Sud Sardegna" | "SAR" => "Sardegna",
        "Napoli" | "Avellino" | "Benevento" | "Caserta" | "Salerno" => "Campania",
        "Roma" | "Frosinone" | "Latina" | "Rieti" | "Viterbo" => "Lazio",
        "Milano" | "Bergamo" | "Brescia" | "Como" | "Cremona" | "Lecco" | "Lodi" | "Mantova"
        | "Monza e della Brianza" | "Pavia" | "Sondrio" | "Varese" => "Lombardia",
        "Torino" | "Alessandria" | "Asti" | "Biella" | "Cuneo" | "Novara"
        | "Verbano-Cusio-Ossola" | "Vercelli" => "Piemonte",
        "Venezia" | "Belluno" | "Padova" | "Rovigo" | "Treviso" | "Verona" | "Vicenza" => {
            "Veneto"
        }
        "Bologna" | "Ferrara" | "Forlì-Cesena" | "Modena" | "Parma" | "Piacenza" | "Ravenna"
        | "Reggio nell'Emilia" | "Reggio Emilia" | "Rimini" => "Emilia-Romagna",
        "Firenze" | "Arezzo" | "Grosseto" | "Livorno" | "Lucca" | "Massa-Carrara" | "Pisa"
        | "Pistoia" | "Prato" | "Siena" => "Toscana",
        "Genova" | "Imperia" | "La Spezia" | "Savona" => "Liguria",
        "Trieste" | "Gorizia" | "Pordenone" | "Udine" => "Friuli-Venezia Giulia",
        "Trento" | "Bolzano" => "Trentino-Alto Adige",
        "Ancona" | "Ascoli Piceno" | "Fermo" | "Macerata" | "Pesaro e Urbino" => "Marche",
        "Perugia" | "Terni" => "Umbria",
        "L'Aquila" | "Chieti" | "Pescara" | "Teramo" => "Abruzzo",
        "Campobasso" | "Isernia" => "Molise",
        "Bari" | "Barletta-Andria-Trani" | "Brindisi" | "Foggia" | "Lecce" | "Taranto" => {
            "Puglia"
        }
        "Potenza" | "Matera" => "Basilicata",
        "Aosta" => "Valle d'Aosta",
        _ => return None,
    };
    Some(region)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn test_inverse_mercator_known_point() {
        // Cosenza
        let p = mercator_to_lat_lng(1_809_420.399_2, 4_764_534.163_5);
        assert!((p.lng - 16.254_3).abs() < 1e-6);
        assert!((p.lat - 39.298_6).abs() < 1e-6);
    }

    #[test]
    fn test_inverse_mercator_stays_in_range() {
        for (x, y) in [
            (0.0, 0.0),
            (ORIGIN_SHIFT * 0.999, ORIGIN_SHIFT * 0.999),
            (-ORIGIN_SHIFT * 0.999, -ORIGIN_SHIFT * 0.999),
            (1_252_344.27, 5_009_377.09),
        ] {
            let p = mercator_to_lat_lng(x, y);
            assert!(p.lat > -90.0 && p.lat < 90.0);
            assert!(p.lng > -180.0 && p.lng < 180.0);
        }
    }

    #[test]
    fn test_forward_then_inverse_recovers_point() {
        let (x, y) = lat_lng_to_mercator(ITALY_CENTER);
        let back = mercator_to_lat_lng(x, y);
        assert_close(back.lat, ITALY_CENTER.lat);
        assert_close(back.lng, ITALY_CENTER.lng);
    }

    #[test]
    fn test_tiles_match_tile_grid() {
        let geometry = ITALY_TILES[0].to_esri_geometry();
        assert_eq!(geometry["spatialReference"]["wkid"], 102_100);
        assert!((geometry["xmin"].as_f64().unwrap() + 1_252_344.271).abs() < 1.0);
        assert!((geometry["ymin"].as_f64().unwrap() - 6_261_721.357).abs() < 1.0);
        assert!((geometry["ymax"].as_f64().unwrap() - 7_514_065.628).abs() < 1.0);
    }

    #[test]
    fn test_classify_calabria_provinces() {
        let at = |lat, lng| classify_area(LatLng { lat, lng });
        assert_eq!(at(39.30, 16.25).province, "CS");
        assert_eq!(at(38.10, 15.65).province, "RC");
        assert_eq!(at(38.91, 16.59).province, "CZ");
        assert_eq!(at(38.67, 16.10).province, "VV");
        assert_eq!(at(38.00, 15.10).municipality, "Area Calabria");
        assert_eq!(at(39.30, 16.25).zone, "Regione Calabria");
    }

    #[test]
    fn test_classify_other_areas() {
        let at = |lat, lng| classify_area(LatLng { lat, lng });
        assert_eq!(at(37.50, 14.00).province, "SIC");
        assert_eq!(at(40.00, 9.00).province, "SAR");
        assert_eq!(at(45.46, 9.19).province, "NORD");
        assert_eq!(at(41.90, 12.50).province, "CENTRO");
        assert_eq!(at(40.85, 14.27).province, "SUD");
    }

    #[test]
    fn test_region_for_province() {
        assert_eq!(region_for_province("Torino"), Some("Piemonte"));
        assert_eq!(region_for_province(" CS "), Some("Calabria"));
        assert_eq!(region_for_province("Atlantide"), None);
    }
}
