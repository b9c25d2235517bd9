mod client;
mod invitations_rsc;
mod queryids;
