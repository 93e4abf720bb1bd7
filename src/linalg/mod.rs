pub mod rsvd;
