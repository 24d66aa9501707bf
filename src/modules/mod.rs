pub mod interpolation;
pub mod pipeline;
pub mod race_api;
pub mod track;

pub mod models {
    pub mod bike;
    pub mod classification;
    pub mod participation;
    pub mod race;
    pub mod rider;
    pub mod season;

    pub mod general;
}

pub mod tasks {
    pub mod assign_classification_places;
    pub mod close_race;
    pub mod process_submission;
    pub mod recalculate_scores;
    pub mod set_race_in_progress;
}

pub mod helpers {
    pub mod logging;
    pub mod math;
}

#[cfg(test)]
pub mod testutil;
