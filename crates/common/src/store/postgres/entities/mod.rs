//! SeaORM entity models
//!
//! Database entities for the duplicate detection core

mod doublons_groupe;
mod etudiant;
mod scan_job;
mod signature_ignoree;

pub use etudiant::{
    ActiveModel as EtudiantActiveModel, Column as EtudiantColumn, Entity as EtudiantEntity,
    Model as Etudiant,
};

pub use doublons_groupe::{
    ActiveModel as GroupeActiveModel, Column as GroupeColumn, Entity as GroupeEntity,
    Model as Groupe,
};

pub use signature_ignoree::{
    ActiveModel as SignatureIgnoreeActiveModel, Column as SignatureIgnoreeColumn,
    Entity as SignatureIgnoreeEntity, Model as SignatureIgnoree,
};

pub use scan_job::{
    ActiveModel as ScanJobActiveModel, Column as ScanJobColumn, Entity as ScanJobEntity,
    Model as ScanJob,
};
