// Crate entry point. Re-export modules so tests and binaries can import them easily.
//
// Responsibilities
// - Only declare and expose modules. No business logic here.
//
// How it is used
// - Integration tests and the shell binary import modules from this crate root.

pub mod config;

pub mod core {
    pub mod commit;
    pub mod event;
    pub mod event_stream;
    pub mod ports;
    pub mod stream_id_hasher;
    pub mod uncommitted_event_queue;
}

pub mod application {
    pub mod errors;
    pub mod event_store;
    pub mod unit_of_work;
    pub mod denormalization {
        pub mod versioned;
    }
    pub mod dispatcher {
        pub mod commit_dispatcher;
        pub mod denormalizer;
        pub mod registry;
        pub mod repository;
        pub mod scheduler;
    }
}

pub mod adapters {
    pub mod in_memory {
        pub mod in_memory_commit_log;
        pub mod in_memory_projections;
    }
    pub mod persistence {
        pub mod commit_record;
    }
    pub mod serialization {
        pub mod json_serializer;
    }
}

pub mod shell {
    pub mod order_summary;
    pub mod orders;
}
