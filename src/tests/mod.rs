use fixture::Fixture;

mod fixture;

mod transactions;
