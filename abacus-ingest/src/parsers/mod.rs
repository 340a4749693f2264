pub mod macc_xml;
