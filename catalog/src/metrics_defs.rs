//! Metrics definitions for the catalog gateway.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CHARACTER_CACHE_HIT: MetricDef = MetricDef {
    name: "character_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of character references served from the client cache",
};

pub const CHARACTER_CACHE_MISS: MetricDef = MetricDef {
    name: "character_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of distinct character references that had to be fetched",
};

pub const FANOUT_BATCH_SIZE: MetricDef = MetricDef {
    name: "fanout.batch_size",
    metric_type: MetricType::Histogram,
    description: "Number of IDs in one fan-out batch",
};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Upstream catalog request duration in seconds. Tagged with endpoint.",
};

pub const UPSTREAM_ERRORS: MetricDef = MetricDef {
    name: "upstream.errors",
    metric_type: MetricType::Counter,
    description: "Failed upstream catalog requests. Tagged with endpoint.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CHARACTER_CACHE_HIT,
    CHARACTER_CACHE_MISS,
    FANOUT_BATCH_SIZE,
    UPSTREAM_REQUEST_DURATION,
    UPSTREAM_ERRORS,
];
