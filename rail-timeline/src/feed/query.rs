//! XML query bodies for the rail-data feed.
//!
//! The feed accepts a `<REQUEST>` document with a login element and one or
//! more `<QUERY>` elements, and answers in JSON.

use chrono::NaiveDate;

use crate::domain::{Signature, TrainIdent};

/// Schema versions per object type.
const ANNOUNCEMENT_SCHEMA: &str = "1.9";
const POSITION_SCHEMA: &str = "1.1";
const STATION_SCHEMA: &str = "1.5";

/// Fields requested for announcement queries.
const ANNOUNCEMENT_FIELDS: &[&str] = &[
    "ActivityId",
    "ActivityType",
    "AdvertisedTrainIdent",
    "OperationalTrainNumber",
    "LocationSignature",
    "AdvertisedLocationName",
    "AdvertisedTimeAtLocation",
    "EstimatedTimeAtLocation",
    "TimeAtLocation",
    "TrackAtLocation",
    "Canceled",
    "Deviation",
    "ProductInformation",
    "InformationOwner",
    "Operator",
    "FromLocation",
    "ToLocation",
    "ModifiedTime",
];

/// Filter for announcement queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnouncementFilter {
    /// Trains to fetch; each matches by whichever identifiers it carries
    pub trains: Vec<TrainIdent>,
    /// Only announcements within this many minutes of now, either side
    pub time_window_mins: Option<u32>,
    /// Only announcements for this service day
    pub target_date: Option<NaiveDate>,
}

impl AnnouncementFilter {
    pub fn for_trains(trains: impl IntoIterator<Item = TrainIdent>) -> Self {
        Self {
            trains: trains.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_time_window(mut self, mins: u32) -> Self {
        self.time_window_mins = Some(mins);
        self
    }

    pub fn with_target_date(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }

    /// Stable key for caching: the same set of trains in any order gives
    /// the same key.
    pub fn cache_key(&self) -> String {
        let mut trains: Vec<String> = self
            .trains
            .iter()
            .map(|t| {
                format!(
                    "{}/{}",
                    t.advertised.as_deref().unwrap_or(""),
                    t.operational.as_deref().unwrap_or("")
                )
            })
            .collect();
        trains.sort();
        trains.dedup();

        format!(
            "{}|{}|{}",
            trains.join(","),
            self.time_window_mins.map(|m| m.to_string()).unwrap_or_default(),
            self.target_date.map(|d| d.to_string()).unwrap_or_default()
        )
    }
}

/// Escape a value for use inside an XML attribute.
pub(crate) fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn request(api_key: &str, queries: &[String]) -> String {
    format!(
        "<REQUEST><LOGIN authenticationkey=\"{}\" />{}</REQUEST>",
        escape(api_key),
        queries.concat()
    )
}

fn eq(name: &str, value: &str) -> String {
    format!("<EQ name=\"{name}\" value=\"{}\" />", escape(value))
}

fn include(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| format!("<INCLUDE>{f}</INCLUDE>"))
        .collect()
}

fn time_window(mins: u32) -> String {
    let hours = mins / 60;
    let rest = mins % 60;
    format!(
        "<GT name=\"AdvertisedTimeAtLocation\" value=\"$dateadd(-{hours:02}:{rest:02}:00)\" />\
         <LT name=\"AdvertisedTimeAtLocation\" value=\"$dateadd({hours:02}:{rest:02}:00)\" />"
    )
}

fn train_clause(train: &TrainIdent) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(adv) = &train.advertised {
        parts.push(eq("AdvertisedTrainIdent", adv));
    }
    if let Some(op) = &train.operational {
        parts.push(eq("OperationalTrainNumber", op));
    }
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("<OR>{}</OR>", parts.concat())),
    }
}

/// Build the query for all announcements of the given trains.
pub fn announcements_query(api_key: &str, filter: &AnnouncementFilter) -> String {
    let trains: Vec<String> = filter.trains.iter().filter_map(train_clause).collect();

    let mut clauses = vec![format!("<OR>{}</OR>", trains.concat())];
    if let Some(mins) = filter.time_window_mins {
        clauses.push(time_window(mins));
    }
    if let Some(date) = filter.target_date {
        clauses.push(eq("ScheduledDepartureDateTime", &date.format("%Y-%m-%d").to_string()));
    }

    let query = format!(
        "<QUERY objecttype=\"TrainAnnouncement\" schemaversion=\"{ANNOUNCEMENT_SCHEMA}\" orderby=\"AdvertisedTimeAtLocation\">\
         <FILTER><AND>{}</AND></FILTER>{}</QUERY>",
        clauses.concat(),
        include(ANNOUNCEMENT_FIELDS)
    );
    request(api_key, &[query])
}

/// Build the query for one side of a station's stops.
///
/// `activity` is the feed's activity text, "Ankomst" or "Avgang".
pub fn station_stops_query(api_key: &str, station: &Signature, activity: &str, window_mins: u32) -> String {
    let query = format!(
        "<QUERY objecttype=\"TrainAnnouncement\" schemaversion=\"{ANNOUNCEMENT_SCHEMA}\" orderby=\"AdvertisedTimeAtLocation\">\
         <FILTER><AND>{}{}{}{}</AND></FILTER>{}</QUERY>",
        eq("LocationSignature", station.as_str()),
        eq("ActivityType", activity),
        eq("Advertised", "true"),
        time_window(window_mins),
        include(ANNOUNCEMENT_FIELDS)
    );
    request(api_key, &[query])
}

/// Build the query for all active live positions.
pub fn positions_query(api_key: &str) -> String {
    let query = format!(
        "<QUERY objecttype=\"TrainPosition\" namespace=\"järnväg.trafikinfo\" schemaversion=\"{POSITION_SCHEMA}\">\
         <FILTER>{}</FILTER></QUERY>",
        eq("Status.Active", "true")
    );
    request(api_key, &[query])
}

/// Build the query for station metadata.
pub fn stations_query(api_key: &str) -> String {
    let query = format!(
        "<QUERY objecttype=\"TrainStation\" namespace=\"rail.infrastructure\" schemaversion=\"{STATION_SCHEMA}\">\
         <FILTER>{}</FILTER>{}</QUERY>",
        eq("Advertised", "true"),
        include(&[
            "LocationSignature",
            "AdvertisedLocationName",
            "AdvertisedShortLocationName",
            "OfficialLocationName",
            "Geometry.WGS84",
        ])
    );
    request(api_key, &[query])
}
