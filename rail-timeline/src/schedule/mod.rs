//! Station and train schedules built from timelines and live positions.

mod aggregator;
mod entry;

pub use aggregator::{Aggregator, ScheduleInputs};
pub use entry::{ItineraryStop, ScheduleEntry, StationSchedule, TrainItinerary, route_label};
